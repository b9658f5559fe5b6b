//! Texture steps

use void_reflection::{path_of, Property, Value};

use crate::document::IrDocument;
use crate::error::MigrationError;

/// Version 4: the origin enumeration collapses into a flip flag
pub fn convert_texture_origin(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for id in doc.ids_of_type(&["Texture"]) {
        let Some(object) = doc.object_mut(&id) else {
            continue;
        };
        let Some(origin) = object.remove("origin") else {
            continue;
        };
        let flip = match origin.value {
            Value::Int(origin) => origin == 1,
            _ => return Err(MigrationError::step(4, &id, "origin is not an integer")),
        };
        object.set("flipTexture", Property::new(flip));
        if doc.remove_links_at(&id, &path_of(["origin"])) > 0 {
            log::warn!("Removed links on obsolete texture origin of '{}'", id);
        }
    }
    Ok(doc)
}

/// Version 10: mipmap generation became opt-in
pub fn add_generate_mipmaps(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for object in doc.objects.iter_mut().filter(|o| o.type_name == "Texture") {
        if object.property("generateMipmaps").is_none() {
            object.set("generateMipmaps", Property::new(false));
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IrObject;
    use void_core::ObjectId;

    #[test]
    fn test_origin_to_flip() {
        let mut doc = IrDocument::new(3);
        for (id, origin) in [("a", 0), ("b", 1)] {
            let mut texture = IrObject::new(ObjectId::new(id), "Texture", id);
            texture.set("origin", Property::new(origin));
            doc.objects.push(texture);
        }
        let doc = add_generate_mipmaps(convert_texture_origin(doc).unwrap()).unwrap();

        let flips: Vec<bool> = doc
            .objects
            .iter()
            .map(|o| o.value("flipTexture").unwrap().as_bool().unwrap())
            .collect();
        assert_eq!(flips, [false, true]);
        assert!(doc.objects.iter().all(|o| o.property("origin").is_none()));
        assert!(doc
            .objects
            .iter()
            .all(|o| o.value("generateMipmaps") == Some(&Value::Bool(false))));
    }
}
