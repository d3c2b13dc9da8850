//! Logical paths vs. host inventory paths.
//!
//! Users name VMs and folders relative to the datacenter's VM folder
//! (`Folder/Sub/VM`); the host indexes them as `/<datacenter>/vm/Folder/Sub/VM`.
//! Paths are opaque strings: no `..`, slash or case normalisation.

/// Path conventions of one datacenter.
#[derive(Debug, Clone, Copy)]
pub struct InventoryPaths<'a> {
    datacenter: &'a str,
}

impl<'a> InventoryPaths<'a> {
    pub fn new(datacenter: &'a str) -> Self {
        Self { datacenter }
    }

    /// `Folder/VM` or `/Folder/VM` → `/<dc>/vm/Folder/VM`.
    pub fn to_inventory(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("/{}/vm/{}", self.datacenter, path)
    }

    /// `/<dc>/vm/Folder/VM` → `Folder/VM`. Anything else is returned as is.
    pub fn to_logical(&self, inventory_path: &str) -> String {
        let prefix = format!("/{}", self.datacenter);
        match inventory_path.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.strip_prefix("/vm/").unwrap_or(rest).to_string(),
            None => inventory_path.to_string(),
        }
    }

    pub fn datacenter(&self) -> String {
        format!("/{}", self.datacenter)
    }

    pub fn datastore(&self, name: &str) -> String {
        format!("/{}/datastore/{}", self.datacenter, name)
    }

    pub fn network(&self, name: &str) -> String {
        format!("/{}/network/{}", self.datacenter, name.trim_start_matches('/'))
    }

    /// Resource pools live under the host folder (`Cluster/Resources/Pool`).
    pub fn resource_pool(&self, name: &str) -> String {
        format!("/{}/host/{}", self.datacenter, name.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_round_trip() {
        let paths = InventoryPaths::new("DC1");
        let inv = paths.to_inventory("Folder/VM1");
        assert_eq!(inv, "/DC1/vm/Folder/VM1");
        assert_eq!(paths.to_logical(&inv), "Folder/VM1");
    }

    #[test]
    fn round_trip_holds_for_assorted_paths() {
        let paths = InventoryPaths::new("Static");
        for p in [
            "VM",
            "Engineering/Templates/Base Template",
            "a//b",
            "../x",
            "Mixed Case/vm/nested",
            "",
        ] {
            assert_eq!(paths.to_logical(&paths.to_inventory(p)), p, "path {p:?}");
        }
    }

    #[test]
    fn only_one_leading_slash_is_stripped() {
        let paths = InventoryPaths::new("DC1");
        assert_eq!(paths.to_inventory("/Folder/VM1"), "/DC1/vm/Folder/VM1");
        assert_eq!(paths.to_inventory("//Folder"), "/DC1/vm//Folder");
    }

    #[test]
    fn foreign_paths_are_left_alone() {
        let paths = InventoryPaths::new("DC1");
        assert_eq!(paths.to_logical("/Other/vm/VM"), "/Other/vm/VM");
        assert_eq!(paths.to_logical("/DC1/host/Cluster"), "/host/Cluster");
    }

    #[test]
    fn sub_resource_paths() {
        let paths = InventoryPaths::new("DC1");
        assert_eq!(paths.datacenter(), "/DC1");
        assert_eq!(paths.datastore("ds-01"), "/DC1/datastore/ds-01");
        assert_eq!(paths.network("VM Network"), "/DC1/network/VM Network");
        assert_eq!(
            paths.resource_pool("Cluster/Resources/Pool"),
            "/DC1/host/Cluster/Resources/Pool"
        );
    }
}
