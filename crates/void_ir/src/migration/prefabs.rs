//! Prefab instance and animation steps

use void_core::ObjectId;
use void_reflection::{path_of, Value};

use crate::document::IrDocument;
use crate::error::MigrationError;

/// Version 11: instance content ids become derived from the prefab ids
///
/// Older files stored an explicit prefab-object to instance-object table on
/// every instance. Content ids are now `derive(prefab object, instance)` so
/// the table is no longer needed.
pub fn derive_prefab_instance_ids(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for instance in doc.ids_of_type(&["PrefabInstance"]) {
        let Some(object) = doc.object_mut(&instance) else {
            continue;
        };
        let Some(map) = object.remove("mapToInstance") else {
            continue;
        };
        let Value::Array(pairs) = map.value else {
            return Err(MigrationError::step(11, &instance, "mapToInstance is not an array"));
        };

        let mut renames: Vec<(ObjectId, ObjectId)> = Vec::new();
        for pair in pairs.iter() {
            let endpoint = |field: &str| {
                pair.value
                    .as_struct()
                    .and_then(|s| s.get(field))
                    .and_then(|p| p.value.as_ref_id())
                    .cloned()
            };
            match (endpoint("prefabObject"), endpoint("instanceObject")) {
                (Some(prefab_object), Some(instance_object)) => {
                    renames.push((instance_object, prefab_object.derive(&instance)));
                }
                _ => log::warn!("Skipping incomplete prefab mapping entry on '{}'", instance),
            }
        }

        for (from, to) in renames {
            if doc.contains(&to) && from != to {
                log::warn!("Derived id '{}' already in use, keeping '{}'", to, from);
                continue;
            }
            doc.rename_object_id(&from, &to);
        }
    }
    Ok(doc)
}

const ANIMATION_CONTROLS: [&str; 3] = ["play", "loop", "rewindOnStop"];

/// Version 12: playback control moved out of the animation object
pub fn drop_animation_controls(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for id in doc.ids_of_type(&["Animation"]) {
        if let Some(object) = doc.object_mut(&id) {
            for control in ANIMATION_CONTROLS {
                object.remove(control);
            }
        }
        for control in ANIMATION_CONTROLS {
            doc.remove_links_at(&id, &path_of([control]));
        }
    }
    Ok(doc)
}
