//! Property renames

use void_reflection::path_of;

use super::NODE_KINDS;
use crate::document::IrDocument;
use crate::error::MigrationError;

const RENAMES: &[(&[&str], &str, &str)] = &[
    (NODE_KINDS, "scale", "scaling"),
    (NODE_KINDS, "visible", "visibility"),
    (&["LuaScript"], "luaOutputs", "outputs"),
];

/// Version 14: property names aligned with the runtime
pub fn rename_node_properties(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for (kinds, from, to) in RENAMES {
        for id in doc.ids_of_type(kinds) {
            let renamed = doc.object_mut(&id).is_some_and(|o| o.rename(from, to));
            if renamed {
                doc.replace_link_prefix(&id, &path_of([*from]), &path_of([*to]));
            }
        }
    }
    Ok(doc)
}
