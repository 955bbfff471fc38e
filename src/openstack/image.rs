//! Glance v2 image lookups.

use crate::provider::Image;

use super::wire::{ImageList, ImageWire};
use super::{OpenStackError, OpenStackSession, pick_unique, resource_url};

impl OpenStackSession {
    pub(super) async fn fetch_images(&self) -> Result<Vec<Image>, OpenStackError> {
        let url = resource_url(&self.endpoints.image, &["images"])?;
        let list: ImageList = self.get_json(url, &[]).await?;
        Ok(list.images.into_iter().map(Image::from).collect())
    }

    pub(super) async fn lookup_image(
        &self,
        name_or_id: &str,
    ) -> Result<Option<Image>, OpenStackError> {
        let by_id = resource_url(&self.endpoints.image, &["images", name_or_id])?;
        if let Some(image) = self.get_optional::<ImageWire>(by_id).await? {
            return Ok(Some(image.into()));
        }

        let url = resource_url(&self.endpoints.image, &["images"])?;
        let list: ImageList = self.get_json(url, &[("name", name_or_id)]).await?;
        let matches = list
            .images
            .into_iter()
            .map(Image::from)
            .filter(|image| image.name == name_or_id)
            .collect();
        pick_unique("image", name_or_id, matches)
    }
}
