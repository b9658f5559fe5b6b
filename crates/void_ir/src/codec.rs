//! JSON document codec
//!
//! Converts between the self-describing JSON document and [`IrDocument`].
//!
//! ## Encoding rules
//!
//! - Values at statically typed positions (top-level properties, struct
//!   fields, array elements) are written bare; their type comes from a
//!   [`PropertyTypeMap`] when reading.
//! - Table entries, and properties at any other position that carry
//!   annotations, are written tagged: `{ "typeName", "value", "annotations" }`.
//! - Tables are `{ "properties": {..}, "order": [..] }`, since JSON objects
//!   do not keep key order.
//! - References are written as the target id; `null` is the null reference.
//! - Non-finite doubles are written as the strings `"NaN"`, `"Infinity"`
//!   and `"-Infinity"`.
//!
//! Anything that cannot be decoded below the document level is dropped with
//! a warning. Only structural problems abort decoding.

use serde_json::{json, Map, Value as Json};
use void_core::ObjectId;
use void_reflection::{
    Annotation, ArrayValue, PathSegment, Property, StructValue, Table, Value, ValueType,
};

use crate::document::{IrDocument, IrLink, IrObject};
use crate::error::DocumentError;
use crate::migration::CURRENT_FILE_VERSION;
use crate::type_map::{legacy_type_map, PropertyTypeMap, TypeResolver};

type DecodeResult<T> = std::result::Result<T, String>;

/// Read a document into IR.
///
/// `current` describes the live object kinds and struct layouts; it is the
/// last fallback when looking up property types.
pub fn read_document(text: &str, current: &PropertyTypeMap) -> Result<IrDocument, DocumentError> {
    let root: Json = serde_json::from_str(text)?;
    let root = root.as_object().ok_or(DocumentError::NotAnObject)?;

    let file_version = root
        .get("fileVersion")
        .and_then(Json::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(DocumentError::MissingField("fileVersion"))?;
    if file_version > CURRENT_FILE_VERSION {
        return Err(DocumentError::UnsupportedVersion {
            found: file_version,
            supported: CURRENT_FILE_VERSION,
        });
    }

    let embedded = match root.get("propertyTypeMaps") {
        Some(maps) => Some(
            serde_json::from_value::<PropertyTypeMap>(maps.clone())
                .map_err(|e| DocumentError::TypeMap(e.to_string()))?,
        ),
        None => None,
    };
    let legacy = legacy_type_map();
    let resolver = match &embedded {
        Some(embedded) => TypeResolver::new(vec![embedded, current]),
        None => TypeResolver::new(vec![&legacy, current]),
    };

    let instances = root
        .get("instances")
        .and_then(Json::as_array)
        .ok_or(DocumentError::MissingField("instances"))?;

    let mut doc = IrDocument::new(file_version);
    for instance in instances {
        match decode_object(instance, &resolver) {
            Ok(object) => doc.objects.push(object),
            Err(message) => log::warn!("Dropping malformed object: {}", message),
        }
    }

    if let Some(links) = root.get("links") {
        let links = links.as_array().ok_or(DocumentError::MissingField("links"))?;
        for link in links {
            match decode_link(link) {
                Ok(link) => doc.links.push(link),
                Err(message) => log::warn!("Dropping malformed link: {}", message),
            }
        }
    }

    if let Some(projects) = root.get("externalProjects") {
        doc.external_projects = serde_json::from_value(projects.clone())
            .map_err(|_| DocumentError::MissingField("externalProjects"))?;
    }

    Ok(doc)
}

/// Write a document as pretty-printed JSON, embedding `type_map`
pub fn write_document(doc: &IrDocument, type_map: &PropertyTypeMap) -> Result<String, DocumentError> {
    let instances: Vec<Json> = doc.objects.iter().map(encode_object).collect();
    let links: Vec<Json> = doc.links.iter().map(encode_link).collect();

    let root = json!({
        "fileVersion": doc.file_version,
        "instances": instances,
        "links": links,
        "externalProjects": serde_json::to_value(&doc.external_projects)?,
        "propertyTypeMaps": serde_json::to_value(type_map)?,
    });
    Ok(serde_json::to_string_pretty(&root)?)
}

fn decode_object(json: &Json, resolver: &TypeResolver<'_>) -> DecodeResult<IrObject> {
    let map = json.as_object().ok_or("instance is not an object")?;
    let type_name = map
        .get("typeName")
        .and_then(Json::as_str)
        .ok_or("missing typeName")?;
    let id = map
        .get("id")
        .and_then(Json::as_str)
        .filter(|id| !id.is_empty())
        .ok_or("missing id")?;

    let mut properties = Table::new();
    if let Some(props) = map.get("properties").and_then(Json::as_object) {
        for (name, value) in props {
            let decoded = if is_tagged(value) {
                decode_tagged(value, resolver)
            } else {
                match resolver.property_type(type_name, name) {
                    Some(ty) => decode_value(value, ty, resolver).map(Property::new),
                    None => {
                        log::warn!(
                            "Dropping unsupported or deprecated property {}.{}",
                            type_name,
                            name
                        );
                        continue;
                    }
                }
            };
            match decoded {
                Ok(property) => properties.set(name.as_str(), property),
                Err(message) => log::warn!(
                    "Dropping unsupported or deprecated property {}.{}: {}",
                    type_name,
                    name,
                    message
                ),
            }
        }
    }

    Ok(IrObject {
        id: ObjectId::new(id),
        type_name: type_name.to_string(),
        properties,
        annotations: map
            .get("annotations")
            .map(decode_annotations)
            .unwrap_or_default(),
    })
}

fn is_tagged(json: &Json) -> bool {
    json.as_object()
        .is_some_and(|m| m.contains_key("typeName") && m.contains_key("value"))
}

fn decode_tagged(json: &Json, resolver: &TypeResolver<'_>) -> DecodeResult<Property> {
    let map = json.as_object().ok_or("tagged value is not an object")?;
    let ty: ValueType = map
        .get("typeName")
        .and_then(Json::as_str)
        .ok_or("missing typeName")?
        .parse()
        .map_err(|e: void_reflection::ValueError| e.to_string())?;
    let value = decode_value(map.get("value").unwrap_or(&Json::Null), &ty, resolver)?;
    let annotations = map
        .get("annotations")
        .map(decode_annotations)
        .unwrap_or_default();
    Ok(Property { value, annotations })
}

fn decode_annotations(json: &Json) -> Vec<Annotation> {
    let Some(items) = json.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Annotation>(item.clone()) {
            Ok(annotation) => Some(annotation),
            Err(e) => {
                log::warn!("Dropping unknown annotation: {}", e);
                None
            }
        })
        .collect()
}

fn decode_value(json: &Json, ty: &ValueType, resolver: &TypeResolver<'_>) -> DecodeResult<Value> {
    let mismatch = || format!("expected {}, found {}", ty, json);
    match ty {
        ValueType::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        ValueType::Int => json
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or_else(mismatch),
        ValueType::Int64 => json.as_i64().map(Value::Int64).ok_or_else(mismatch),
        ValueType::Double => match json {
            Json::String(s) => decode_non_finite(s).map(Value::Double).ok_or_else(mismatch),
            _ => json.as_f64().map(Value::Double).ok_or_else(mismatch),
        },
        ValueType::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        ValueType::Ref => match json {
            Json::Null => Ok(Value::Ref(None)),
            Json::String(s) if s.is_empty() => Ok(Value::Ref(None)),
            Json::String(s) => Ok(Value::Ref(Some(ObjectId::new(s.as_str())))),
            _ => Err(mismatch()),
        },
        ValueType::Struct(name) => {
            let map = json.as_object().ok_or_else(mismatch)?;
            let fields = resolver
                .struct_fields(name)
                .ok_or_else(|| format!("unknown struct type {}", name))?;
            let mut decoded = Vec::with_capacity(fields.len());
            for (field, value) in map {
                match fields.get(field) {
                    Some(field_ty) => {
                        let property = decode_entry(value, field_ty, resolver)?;
                        decoded.push((field.clone(), property));
                    }
                    None => log::warn!("Dropping unknown field {} of struct {}", field, name),
                }
            }
            for field in fields.keys() {
                if !map.contains_key(field) {
                    log::warn!("Struct {} is missing field {}", name, field);
                }
            }
            Ok(Value::Struct(StructValue::new(name.clone(), decoded)))
        }
        ValueType::Array(element) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let mut array = ArrayValue::new((**element).clone());
            for item in items {
                let property = decode_entry(item, element, resolver)?;
                array.push(property).map_err(|e| e.to_string())?;
            }
            Ok(Value::Array(array))
        }
        ValueType::Table => decode_table(json, resolver).map(Value::Table),
    }
}

/// Decode a struct field or array element, which is bare unless it
/// carries annotations
fn decode_entry(json: &Json, ty: &ValueType, resolver: &TypeResolver<'_>) -> DecodeResult<Property> {
    if !is_tagged(json) {
        return decode_value(json, ty, resolver).map(Property::new);
    }
    let property = decode_tagged(json, resolver)?;
    let found = property.value.value_type();
    if &found != ty {
        return Err(format!("expected {}, found {}", ty, found));
    }
    Ok(property)
}

fn decode_non_finite(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn decode_table(json: &Json, resolver: &TypeResolver<'_>) -> DecodeResult<Table> {
    let map = json.as_object().ok_or("table is not an object")?;
    let empty = Map::new();
    let properties = match map.get("properties") {
        Some(p) => p.as_object().ok_or("table properties is not an object")?,
        None => &empty,
    };

    let mut names: Vec<&str> = map
        .get("order")
        .and_then(Json::as_array)
        .map(|order| order.iter().filter_map(Json::as_str).collect())
        .unwrap_or_default();
    for name in properties.keys() {
        if !names.contains(&name.as_str()) {
            names.push(name.as_str());
        }
    }

    let mut table = Table::new();
    for name in names {
        let Some(entry) = properties.get(name) else {
            log::warn!("Table order lists missing entry {}", name);
            continue;
        };
        match decode_tagged(entry, resolver) {
            Ok(property) => {
                if table.insert(name, property).is_err() {
                    log::warn!("Duplicate table entry {} discarded", name);
                }
            }
            Err(message) => log::warn!("Dropping table entry {}: {}", name, message),
        }
    }
    Ok(table)
}

fn decode_path(json: Option<&Json>) -> DecodeResult<Vec<PathSegment>> {
    let items = json.and_then(Json::as_array).ok_or("property path is not an array")?;
    items
        .iter()
        .map(|item| match item {
            Json::String(name) => Ok(PathSegment::Name(name.clone())),
            Json::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(PathSegment::Index)
                .ok_or_else(|| format!("invalid path index {}", n)),
            other => Err(format!("invalid path segment {}", other)),
        })
        .collect()
}

fn decode_link(json: &Json) -> DecodeResult<IrLink> {
    let map = json.as_object().ok_or("link is not an object")?;
    let object = |key: &str| {
        map.get(key)
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .map(ObjectId::new)
            .ok_or_else(|| format!("missing {}", key))
    };
    Ok(IrLink {
        start_object: object("startObject")?,
        start_path: decode_path(map.get("startProp"))?,
        end_object: object("endObject")?,
        end_path: decode_path(map.get("endProp"))?,
        valid: map.get("isValid").and_then(Json::as_bool).unwrap_or(true),
        weak: map.get("isWeak").and_then(Json::as_bool).unwrap_or(false),
    })
}

fn encode_object(object: &IrObject) -> Json {
    let mut properties = Map::new();
    for (name, property) in object.properties.iter() {
        properties.insert(name.to_string(), encode_entry(property));
    }

    let mut map = Map::new();
    map.insert("typeName".into(), Json::from(object.type_name.as_str()));
    map.insert("id".into(), Json::from(object.id.as_str()));
    map.insert("properties".into(), Json::Object(properties));
    if !object.annotations.is_empty() {
        map.insert("annotations".into(), encode_annotations(&object.annotations));
    }
    Json::Object(map)
}

fn encode_annotations(annotations: &[Annotation]) -> Json {
    Json::Array(
        annotations
            .iter()
            .filter_map(|a| serde_json::to_value(a).ok())
            .collect(),
    )
}

fn encode_tagged(property: &Property) -> Json {
    let mut map = Map::new();
    map.insert(
        "typeName".into(),
        Json::from(property.value.value_type().to_string()),
    );
    map.insert("value".into(), encode_value(&property.value));
    if !property.annotations.is_empty() {
        map.insert("annotations".into(), encode_annotations(&property.annotations));
    }
    Json::Object(map)
}

/// Bare value, or tagged when annotations must travel with it
fn encode_entry(property: &Property) -> Json {
    if property.annotations.is_empty() {
        encode_value(&property.value)
    } else {
        encode_tagged(property)
    }
}

fn encode_value(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::from(*b),
        Value::Int(i) => Json::from(*i),
        Value::Int64(i) => Json::from(*i),
        Value::Double(d) => match serde_json::Number::from_f64(*d) {
            Some(n) => Json::Number(n),
            None if d.is_nan() => Json::from("NaN"),
            None if *d > 0.0 => Json::from("Infinity"),
            None => Json::from("-Infinity"),
        },
        Value::String(s) => Json::from(s.as_str()),
        Value::Ref(Some(id)) => Json::from(id.as_str()),
        Value::Ref(None) => Json::Null,
        Value::Struct(s) => Json::Object(
            s.iter()
                .map(|(name, field)| (name.to_string(), encode_entry(field)))
                .collect(),
        ),
        Value::Array(a) => Json::Array(a.iter().map(encode_entry).collect()),
        Value::Table(t) => {
            let properties: Map<String, Json> = t
                .iter()
                .map(|(name, entry)| (name.to_string(), encode_tagged(entry)))
                .collect();
            let order: Vec<Json> = t.names().map(Json::from).collect();
            json!({ "properties": properties, "order": order })
        }
    }
}

fn encode_path(path: &[PathSegment]) -> Json {
    Json::Array(
        path.iter()
            .map(|segment| match segment {
                PathSegment::Name(name) => Json::from(name.as_str()),
                PathSegment::Index(index) => Json::from(*index),
            })
            .collect(),
    )
}

fn encode_link(link: &IrLink) -> Json {
    json!({
        "startObject": link.start_object.as_str(),
        "startProp": encode_path(&link.start_path),
        "endObject": link.end_object.as_str(),
        "endProp": encode_path(&link.end_path),
        "isValid": link.valid,
        "isWeak": link.weak,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_reflection::path_of;

    fn current() -> PropertyTypeMap {
        PropertyTypeMap::new()
            .with_property("Node", "objectName", ValueType::String)
            .with_property("Node", "children", ValueType::array(ValueType::Ref))
            .with_property("Node", "translation", ValueType::structure("Vec3f"))
            .with_property("Node", "inputs", ValueType::Table)
            .with_field("Vec3f", "x", ValueType::Double)
            .with_field("Vec3f", "y", ValueType::Double)
            .with_field("Vec3f", "z", ValueType::Double)
    }

    #[test]
    fn test_rejects_future_version() {
        let text = format!(r#"{{"fileVersion": {}, "instances": []}}"#, CURRENT_FILE_VERSION + 1);
        assert!(matches!(
            read_document(&text, &current()),
            Err(DocumentError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(read_document("[1,2]", &current()), Err(DocumentError::NotAnObject)));
        assert!(matches!(read_document("{", &current()), Err(DocumentError::Json(_))));
        assert!(matches!(
            read_document(r#"{"instances": []}"#, &current()),
            Err(DocumentError::MissingField("fileVersion"))
        ));
    }

    #[test]
    fn test_unknown_property_is_dropped() {
        let text = r#"{
            "fileVersion": 14,
            "instances": [{
                "typeName": "Node", "id": "n1",
                "properties": { "objectName": "a", "bogus": 3 }
            }],
            "propertyTypeMaps": { "objects": {}, "structs": {} }
        }"#;
        let doc = read_document(text, &current()).unwrap();
        let node = &doc.objects[0];
        assert_eq!(node.name(), "a");
        assert!(node.property("bogus").is_none());
    }

    #[test]
    fn test_table_order_survives() {
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        let mut node = IrObject::new(ObjectId::new("n1"), "Node", "n");
        let inputs = Table::new()
            .with("zeta", Property::new(1).with_annotation(Annotation::link_end()))
            .with("alpha", Property::new(2.5));
        node.set("inputs", Property::new(inputs));
        doc.objects.push(node);
        doc.links.push(IrLink::new(
            ObjectId::new("n1"),
            path_of(["inputs", "alpha"]),
            ObjectId::new("n1"),
            vec![PathSegment::from("children"), PathSegment::from(0usize)],
        ));

        let text = write_document(&doc, &current()).unwrap();
        let back = read_document(&text, &current()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_nested_annotations_survive() {
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        let mut node = IrObject::new(ObjectId::new("n1"), "Node", "n");
        let translation = StructValue::new(
            "Vec3f",
            vec![
                ("x".into(), Property::new(1.0).with_annotation(Annotation::RangeDouble { min: 0.0, max: 2.0 })),
                ("y".into(), Property::new(0.0)),
                ("z".into(), Property::new(0.0)),
            ],
        );
        node.set("translation", Property::new(translation));
        let children = ArrayValue::with_elements(
            ValueType::Ref,
            vec![
                Property::new(ObjectId::new("c1")).with_annotation(Annotation::Hidden),
                Property::new(ObjectId::new("c2")),
            ],
        )
        .unwrap();
        node.set("children", Property::new(children));
        doc.objects.push(node);

        let text = write_document(&doc, &current()).unwrap();
        let back = read_document(&text, &current()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_non_finite_doubles_survive() {
        let mut doc = IrDocument::new(CURRENT_FILE_VERSION);
        let mut node = IrObject::new(ObjectId::new("n1"), "Node", "n");
        let inputs = Table::new()
            .with("nan", Property::new(f64::NAN))
            .with("up", Property::new(f64::INFINITY))
            .with("down", Property::new(f64::NEG_INFINITY));
        node.set("inputs", Property::new(inputs));
        doc.objects.push(node);

        let text = write_document(&doc, &current()).unwrap();
        let back = read_document(&text, &current()).unwrap();
        let inputs = back.objects[0].property("inputs").unwrap().value.as_table().unwrap();
        assert!(inputs.get("nan").unwrap().value.as_double().unwrap().is_nan());
        assert_eq!(inputs.get("up").unwrap().value.as_double(), Some(f64::INFINITY));
        assert_eq!(inputs.get("down").unwrap().value.as_double(), Some(f64::NEG_INFINITY));
    }
}
