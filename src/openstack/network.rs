//! Neutron v2.0 networks, ports and floating IPs.

use reqwest::Method;
use tracing::debug;

use crate::provider::{FloatingIp, Network, Port};

use super::wire::{
    FloatingIpCreateBody, FloatingIpEnvelope, FloatingIpList, FloatingIpUpdateBody,
    NetworkEnvelope, NetworkList, PortList,
};
use super::{OpenStackError, OpenStackSession, pick_unique, resource_url};

impl OpenStackSession {
    pub(super) async fn lookup_network(
        &self,
        name_or_id: &str,
    ) -> Result<Option<Network>, OpenStackError> {
        let by_id = resource_url(&self.endpoints.network, &["networks", name_or_id])?;
        if let Some(found) = self.get_optional::<NetworkEnvelope>(by_id).await? {
            return Ok(Some(found.network));
        }

        let url = resource_url(&self.endpoints.network, &["networks"])?;
        let list: NetworkList = self.get_json(url, &[("name", name_or_id)]).await?;
        let matches = list
            .networks
            .into_iter()
            .filter(|net| net.name == name_or_id)
            .collect();
        pick_unique("network", name_or_id, matches)
    }

    pub(super) async fn fetch_ports(&self) -> Result<Vec<Port>, OpenStackError> {
        let url = resource_url(&self.endpoints.network, &["ports"])?;
        let list: PortList = self.get_json(url, &[]).await?;
        Ok(list.ports)
    }

    pub(super) async fn allocate_floating_ip(
        &self,
        network_id: &str,
    ) -> Result<FloatingIp, OpenStackError> {
        let url = resource_url(&self.endpoints.network, &["floatingips"])?;
        let created: FloatingIpEnvelope = self
            .send_json(Method::POST, url, &FloatingIpCreateBody::on_network(network_id))
            .await?;
        debug!(
            address = %created.floatingip.floating_ip_address,
            network_id,
            "allocated floating IP"
        );
        Ok(created.floatingip)
    }

    pub(super) async fn lookup_floating_ip(
        &self,
        address: &str,
    ) -> Result<Option<FloatingIp>, OpenStackError> {
        let url = resource_url(&self.endpoints.network, &["floatingips"])?;
        let list: FloatingIpList = self
            .get_json(url, &[("floating_ip_address", address)])
            .await?;
        let matches = list
            .floatingips
            .into_iter()
            .filter(|ip| ip.floating_ip_address == address)
            .collect();
        pick_unique("floating IP", address, matches)
    }

    /// Points the floating IP at `port_id`, or detaches it when `None`.
    pub(super) async fn update_floating_ip(
        &self,
        ip: &FloatingIp,
        port_id: Option<&str>,
    ) -> Result<FloatingIp, OpenStackError> {
        let url = resource_url(&self.endpoints.network, &["floatingips", ip.id.as_str()])?;
        let body = port_id.map_or_else(FloatingIpUpdateBody::detach, FloatingIpUpdateBody::attach);
        let updated: FloatingIpEnvelope = self.send_json(Method::PUT, url, &body).await?;
        Ok(updated.floatingip)
    }

    pub(super) async fn release_floating_ip(&self, ip: &FloatingIp) -> Result<(), OpenStackError> {
        let url = resource_url(&self.endpoints.network, &["floatingips", ip.id.as_str()])?;
        self.delete(url).await
    }
}
