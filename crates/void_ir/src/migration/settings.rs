//! Project settings, transform and render layer steps

use void_core::ObjectId;
use void_reflection::{path_of, vec3f, vec4f, Property, StructValue, Value};

use super::NODE_KINDS;
use crate::document::{IrDocument, IrObject};
use crate::error::MigrationError;

const SETTINGS: &str = "ProjectSettings";

/// Version 2: every document has exactly one settings object
pub fn add_project_settings(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    if doc.objects.iter().any(|o| o.type_name == SETTINGS) {
        return Ok(doc);
    }
    let ids: Vec<String> = doc.sorted_ids().iter().map(|id| id.to_string()).collect();
    let id = ObjectId::from_name(&format!("{}:{}", SETTINGS, ids.join(",")));
    doc.objects.insert(0, IrObject::new(id, SETTINGS, SETTINGS));
    Ok(doc)
}

/// Version 5: settings gain a black background color
pub fn add_background_color(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for object in doc.objects.iter_mut().filter(|o| o.type_name == SETTINGS) {
        if object.property("backgroundColor").is_none() {
            object.set("backgroundColor", Property::new(vec3f(0.0, 0.0, 0.0)));
        }
    }
    Ok(doc)
}

/// Version 9: the background color gains an alpha channel
pub fn widen_background_color(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for object in doc.objects.iter_mut().filter(|o| o.type_name == SETTINGS) {
        let Some(old) = object.value("backgroundColor").and_then(Value::as_struct) else {
            continue;
        };
        if old.type_name() != "Vec3f" {
            continue;
        }
        let field = |s: &StructValue, name: &str| s.get(name).and_then(|p| p.value.as_double()).unwrap_or(0.0);
        let color = vec4f(field(old, "x"), field(old, "y"), field(old, "z"), 1.0);
        object.set("backgroundColor", Property::new(color));
    }
    Ok(doc)
}

fn vector(object: &IrObject, name: &str) -> Option<[f64; 3]> {
    let value = object.value(name)?.as_struct()?;
    let component = |c: &str| value.get(c).and_then(|p| p.value.as_double());
    Some([component("x")?, component("y")?, component("z")?])
}

/// Version 6: rotation is now applied after scaling
///
/// Nodes that combine a rotation with a non-uniform scale render
/// differently; they are flagged rather than changed.
pub fn warn_transform_order(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    let mut flagged = Vec::new();
    for object in doc.objects.iter().filter(|o| o.is_type(NODE_KINDS)) {
        let rotation_linked = doc.has_link_ending_at(&object.id, &path_of(["rotation"]));
        let scale_linked = doc.has_link_ending_at(&object.id, &path_of(["scale"]));

        let rotated = rotation_linked
            || vector(object, "rotation").is_some_and(|r| r.iter().any(|c| *c != 0.0));
        let non_uniform = scale_linked
            || vector(object, "scale").is_some_and(|s| s[0] != s[1] || s[1] != s[2]);

        if rotated && non_uniform {
            flagged.push(object.id.clone());
        }
    }
    for id in flagged {
        doc.add_warning(
            &id,
            "Transformation order changed: rotation combined with non-uniform scaling may render differently.",
        );
    }
    Ok(doc)
}

/// Version 8: the render layer sort orders were renumbered
pub fn remap_layer_sort_order(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for object in doc.objects.iter_mut().filter(|o| o.type_name == "RenderLayer") {
        let Some(order) = object.value("sortOrder").and_then(Value::as_int) else {
            continue;
        };
        let remapped = match order {
            0 | 1 => 0,
            2 => 1,
            other => other,
        };
        if let Some(property) = object.properties.get_mut("sortOrder") {
            property.value = Value::Int(remapped);
        }
    }
    Ok(doc)
}
