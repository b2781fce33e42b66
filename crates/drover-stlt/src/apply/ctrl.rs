//! Controller-wide configuration and the LUKS master key.

use tracing::{debug, info};

use drover_core::keys::ResourceKey;
use drover_core::world::{RscDfnMap, SatelliteConf, WorldGuard, WorldParts};
use drover_proto::constants::KEY_NODE_NAME;
use drover_proto::name::NodeName;
use drover_proto::pojo::PropsMap;
use drover_proto::DrResult;

use super::ChangedKeys;
use crate::state::StltState;

/// Replace the satellite properties wholesale, keeping the local node name.
pub fn sync_ctrl_props(conf: &mut SatelliteConf, props: &PropsMap) {
    conf.props.sync_from(props);
    if let Some(local) = &conf.local_node {
        conf.props.set(KEY_NODE_NAME, local.as_str());
    }
}

pub fn apply_ctrl_config(guard: &mut WorldGuard<'_>, props: &PropsMap) -> DrResult<ChangedKeys> {
    let conf = guard.conf_mut()?;
    sync_ctrl_props(conf, props);
    debug!("controller properties replaced, {} keys", conf.props.len());
    Ok(ChangedKeys {
        ctrl: true,
        ..ChangedKeys::default()
    })
}

/// Forget every decrypted LUKS password. Returns the local resources with
/// LUKS volumes, which device management must revisit.
pub fn invalidate_luks_passwords(
    rsc_dfns: &mut RscDfnMap,
    local: Option<&NodeName>,
) -> Vec<ResourceKey> {
    let mut affected = Vec::new();
    for dfn in rsc_dfns.values_mut() {
        for rsc in dfn.resources.values_mut() {
            let mut has_luks = false;
            for obj in rsc.layer_tree.objects_mut() {
                if let Some(vlms) = obj.data.luks_vlms_mut() {
                    has_luks = true;
                    for vlm in vlms.values_mut() {
                        vlm.decrypted_password = None;
                    }
                }
            }
            if has_luks && Some(&rsc.key.node) == local {
                affected.push(rsc.key.clone());
            }
        }
        for snap_dfn in dfn.snapshot_dfns.values_mut() {
            for snap in snap_dfn.snapshots.values_mut() {
                for obj in snap.layer_tree.objects_mut() {
                    if let Some(vlms) = obj.data.luks_vlms_mut() {
                        for vlm in vlms.values_mut() {
                            vlm.decrypted_password = None;
                        }
                    }
                }
            }
        }
    }
    affected
}

pub fn apply_crypt_key(
    parts: &mut WorldParts<'_>,
    stlt: &StltState,
    master_key: Vec<u8>,
) -> DrResult<ChangedKeys> {
    info!("master key received ({} bytes)", master_key.len());
    stlt.set_master_key(master_key);
    let local = parts.conf.local_node.clone();
    let mut keys = ChangedKeys::default();
    keys.rscs
        .extend(invalidate_luks_passwords(&mut *parts.rsc_dfns, local.as_ref()));
    Ok(keys)
}
