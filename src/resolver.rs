//! Translation of endpoint parameters into provider resource handles.
//!
//! Lookups run in a fixed order: image, flavor, keypair, network, public
//! network. Every lookup completes before the only mutating step, floating-IP
//! allocation, so a misconfigured parameter never leaves provider state
//! behind.

use tracing::debug;

use crate::error::EndpointError;
use crate::parameters::{
    EndpointParameters, FLAVOR_NAME, IMAGE_ID, IMAGE_NAME, KEY_NAME, NETWORK_NAME, PUBLIC_NETWORK,
};
use crate::provider::{Flavor, FloatingIp, Image, Keypair, Network, Provider};

/// Provider handles resolved for one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedResources {
    /// Boot image.
    pub image: Image,
    /// Sizing flavor.
    pub flavor: Flavor,
    /// Keypair, when `KeyName` is set.
    pub keypair: Option<Keypair>,
    /// Private network, when `NetworkName` is set.
    pub network: Option<Network>,
    /// Floating IP allocated on `PublicNetwork`, when set. Not yet attached.
    pub floating_ip: Option<FloatingIp>,
}

/// Resolves parameters against a provider session.
#[derive(Debug)]
pub struct ResourceResolver<'a, P> {
    provider: &'a P,
}

impl<'a, P: Provider> ResourceResolver<'a, P> {
    /// Creates a resolver bound to `provider`.
    #[must_use]
    pub const fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Resolves every resource named in `params` and allocates the floating
    /// IP last.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] or
    /// [`EndpointError::InvalidParameter`] when a parameter does not resolve,
    /// [`EndpointError::Ambiguous`] when a name matches several resources,
    /// and [`EndpointError::ProviderFailure`] when a provider call fails.
    pub async fn resolve(
        &self,
        params: &EndpointParameters,
    ) -> Result<ResolvedResources, EndpointError> {
        let image = self.resolve_image(params).await?;
        let flavor = self.resolve_flavor(params).await?;
        let keypair = self.resolve_keypair(params).await?;
        let network = self.resolve_network(params).await?;
        let public_network = self.resolve_public_network(params).await?;

        let floating_ip = match public_network {
            Some(net) => Some(self.allocate_floating_ip(&net).await?),
            None => None,
        };

        Ok(ResolvedResources {
            image,
            flavor,
            keypair,
            network,
            floating_ip,
        })
    }

    /// Resolves the image by `ImageID`, falling back to `ImageName`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] when neither key yields an image.
    pub async fn resolve_image(&self, params: &EndpointParameters) -> Result<Image, EndpointError> {
        let mut tried = Vec::new();
        for key in [IMAGE_ID, IMAGE_NAME] {
            let Some(value) = params.text(key) else {
                continue;
            };
            if let Some(image) = self
                .provider
                .find_image(&value)
                .await
                .map_err(|err| {
                    EndpointError::lookup(format!("find image {value}"), "image", &value, &err)
                })?
            {
                debug!(image_id = %image.id, lookup = key, "resolved image");
                return Ok(image);
            }
            tried.push(value);
        }

        let name = if tried.is_empty() {
            String::from("(no ImageID or ImageName given)")
        } else {
            tried.join(" / ")
        };
        Err(EndpointError::not_found("image", name))
    }

    /// Resolves the mandatory `FlavorName`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidParameter`] when the key is missing and
    /// [`EndpointError::NotFound`] when the flavor does not exist.
    pub async fn resolve_flavor(
        &self,
        params: &EndpointParameters,
    ) -> Result<Flavor, EndpointError> {
        let name = params
            .text(FLAVOR_NAME)
            .ok_or_else(|| EndpointError::InvalidParameter(String::from("no flavor specified")))?;
        self.provider
            .find_flavor(&name)
            .await
            .map_err(|err| {
                EndpointError::lookup(format!("find flavor {name}"), "flavor", &name, &err)
            })?
            .ok_or_else(|| EndpointError::not_found("flavor", name))
    }

    /// Resolves the optional `KeyName`. A configured but unknown keypair is a
    /// hard failure.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] when the keypair does not exist.
    pub async fn resolve_keypair(
        &self,
        params: &EndpointParameters,
    ) -> Result<Option<Keypair>, EndpointError> {
        let Some(name) = params.text(KEY_NAME) else {
            return Ok(None);
        };
        self.provider
            .find_keypair(&name)
            .await
            .map_err(|err| {
                EndpointError::lookup(format!("find keypair {name}"), "keypair", &name, &err)
            })?
            .map(Some)
            .ok_or_else(|| EndpointError::not_found("keypair", name))
    }

    /// Resolves the optional `NetworkName`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] when the network does not exist.
    pub async fn resolve_network(
        &self,
        params: &EndpointParameters,
    ) -> Result<Option<Network>, EndpointError> {
        self.optional_network(params, NETWORK_NAME, "network").await
    }

    /// Resolves the optional `PublicNetwork` used for floating IPs.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::NotFound`] when the network does not exist.
    pub async fn resolve_public_network(
        &self,
        params: &EndpointParameters,
    ) -> Result<Option<Network>, EndpointError> {
        self.optional_network(params, PUBLIC_NETWORK, "public network").await
    }

    /// Allocates a floating IP on `network`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::ProviderFailure`] when allocation fails.
    pub async fn allocate_floating_ip(
        &self,
        network: &Network,
    ) -> Result<FloatingIp, EndpointError> {
        let ip = self
            .provider
            .create_floating_ip(&network.id)
            .await
            .map_err(|err| {
                EndpointError::provider(format!("allocate floating IP on {}", network.name), &err)
            })?;
        debug!(address = %ip.floating_ip_address, network = %network.name, "allocated floating IP");
        Ok(ip)
    }

    async fn optional_network(
        &self,
        params: &EndpointParameters,
        key: &str,
        resource: &str,
    ) -> Result<Option<Network>, EndpointError> {
        let Some(name) = params.text(key) else {
            return Ok(None);
        };
        self.provider
            .find_network(&name)
            .await
            .map_err(|err| {
                EndpointError::lookup(format!("find {resource} {name}"), resource, &name, &err)
            })?
            .map(Some)
            .ok_or_else(|| EndpointError::not_found(resource, name))
    }
}
