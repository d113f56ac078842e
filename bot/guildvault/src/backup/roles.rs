use crate::models::RoleRecord;
use crate::platform::{GuildPlatform, LiveRole, NewRole};
use crate::prelude::*;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RoleRestore {
    pub created: Vec<LiveRole>,
    pub failed: usize,
    /// Source role id to the role created for it.
    pub id_map: HashMap<u64, Id<RoleMarker>>,
}

impl RoleRestore {
    pub fn count(&self) -> usize {
        self.created.len()
    }
}

/// Recreates roles from most to least senior.
///
/// New roles are ranked above existing ones in creation order, so creating
/// the most senior first reproduces the source hierarchy. A role that fails
/// to be created is logged and skipped.
pub async fn restore_roles<P>(platform: &P, roles: &[RoleRecord]) -> RoleRestore
where
    P: GuildPlatform + ?Sized,
{
    let mut ordered: Vec<&RoleRecord> = roles.iter().collect();
    ordered.sort_by_key(|role| Reverse(role.position));

    let mut restore = RoleRestore::default();
    for record in ordered {
        let new_role = NewRole {
            name: &record.name,
            permissions: record.permissions,
            color: record.color,
            hoist: record.hoist,
            mentionable: record.mentionable,
        };
        match platform.create_role(&new_role).await {
            Ok(role) => {
                debug!("Created role {:?} ({} -> {})", role.name, record.id, role.id);
                metrics::increment_counter!("guildvault_restored_items", "kind" => "role");
                restore.id_map.insert(record.id, role.id);
                restore.created.push(role);
            }
            Err(err) => {
                if err.is_privilege() {
                    warn!("Missing permissions to create role {:?}: {}", record.name, err);
                } else {
                    error!("Failed to create role {:?}: {}", record.name, err);
                }
                metrics::increment_counter!("guildvault_failed_items", "kind" => "role");
                restore.failed += 1;
            }
        }
    }
    restore
}
