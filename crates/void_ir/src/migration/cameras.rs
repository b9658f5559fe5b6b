//! Camera steps

use void_reflection::{path_of, PathSegment, Property, StructValue, Value};

use super::CAMERA_KINDS;
use crate::document::IrDocument;
use crate::error::MigrationError;

const VIEWPORT_FIELDS: [(&str, &str); 4] = [
    ("i1", "viewPortOffsetX"),
    ("i2", "viewPortOffsetY"),
    ("i3", "viewPortWidth"),
    ("i4", "viewPortHeight"),
];

/// Version 3: the packed viewport becomes four scalar properties
pub fn split_camera_viewport(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for id in doc.ids_of_type(CAMERA_KINDS) {
        let Some(object) = doc.object_mut(&id) else {
            continue;
        };
        let Some(viewport) = object.remove("viewport") else {
            continue;
        };
        let Value::Struct(viewport) = viewport.value else {
            return Err(MigrationError::step(3, &id, "viewport is not a Vec4i struct"));
        };
        for (field, name) in VIEWPORT_FIELDS {
            let value = viewport.get(field).and_then(|p| p.value.as_int()).unwrap_or(0);
            object.set(name, Property::new(value));
        }

        let whole = path_of(["viewport"]);
        if doc.links.iter().any(|l| l.ends_at(&id, &whole) && l.end_path.len() == 1) {
            doc.add_warning(&id, "Link to the whole viewport removed; link the individual viewport properties instead.");
        }
        doc.links.retain(|l| {
            let on_whole = |object: &void_core::ObjectId, path: &[PathSegment]| object == &id && path == whole.as_slice();
            !on_whole(&l.start_object, &l.start_path) && !on_whole(&l.end_object, &l.end_path)
        });
        doc.rewrite_link_paths(&id, |path| {
            if path.len() < 2 || path[0].as_name() != Some("viewport") {
                return None;
            }
            let field = path[1].as_name()?;
            let (_, name) = VIEWPORT_FIELDS.iter().find(|(f, _)| *f == field)?;
            let mut rewritten = path_of([*name]);
            rewritten.extend_from_slice(&path[2..]);
            Some(rewritten)
        });
    }
    Ok(doc)
}

struct FrustumLayout {
    kind: &'static str,
    struct_name: &'static str,
    /// Legacy flat property, frustum field, default
    planes: &'static [(&'static str, &'static str, f64)],
}

const FRUSTUMS: [FrustumLayout; 2] = [
    FrustumLayout {
        kind: "PerspectiveCamera",
        struct_name: "PerspectiveFrustum",
        planes: &[
            ("near", "nearPlane", 0.1),
            ("far", "farPlane", 1000.0),
            ("fov", "fieldOfView", 35.0),
            ("aspect", "aspectRatio", 2.0),
        ],
    },
    FrustumLayout {
        kind: "OrthographicCamera",
        struct_name: "OrthographicFrustum",
        planes: &[
            ("near", "nearPlane", 0.1),
            ("far", "farPlane", 1000.0),
            ("left", "leftPlane", -10.0),
            ("right", "rightPlane", 10.0),
            ("bottom", "bottomPlane", -10.0),
            ("top", "topPlane", 10.0),
        ],
    },
];

/// Version 7: flat camera planes move into a nested frustum struct
pub fn regroup_camera_frustum(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    for layout in &FRUSTUMS {
        for id in doc.ids_of_type(&[layout.kind]) {
            let Some(object) = doc.object_mut(&id) else {
                continue;
            };
            if object.property("frustum").is_some() {
                continue;
            }

            let mut fields = Vec::with_capacity(layout.planes.len());
            for (legacy, field, default) in layout.planes {
                let value = match object.remove(legacy) {
                    Some(property) => property
                        .value
                        .as_double()
                        .ok_or_else(|| MigrationError::step(7, &id, format!("'{}' is not a number", legacy)))?,
                    None => *default,
                };
                fields.push((field.to_string(), Property::new(value)));
            }
            object.set("frustum", Property::new(StructValue::new(layout.struct_name, fields)));

            for (legacy, field, _) in layout.planes {
                doc.replace_link_prefix(&id, &path_of([*legacy]), &path_of(["frustum", *field]));
            }
        }
    }
    Ok(doc)
}
