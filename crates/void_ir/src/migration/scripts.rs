//! Script interface split
//!
//! Scripts used to declare their inputs inline. Inputs are now declared by a
//! separate interface object backed by its own file, and the script's inputs
//! are fed from the interface through links.

use void_core::ObjectId;
use void_reflection::{path_of, Annotation, LinkCapability, PathSegment, Property, Table, Value};

use crate::document::{GeneratedFile, IrDocument, IrLink, IrObject};
use crate::error::MigrationError;

const VERSION: u32 = 13;

/// Second operand when deriving a script's interface id
pub const INTERFACE_ID_SALT: &str = "00000000-0000-0000-0000-000000000001";

/// Version 13: inline script inputs move to a new interface object
pub fn split_script_interfaces(mut doc: IrDocument) -> Result<IrDocument, MigrationError> {
    let salt = ObjectId::new(INTERFACE_ID_SALT);

    for script_id in doc.ids_of_type(&["LuaScript"]) {
        let interface_id = script_id.derive(&salt);
        let Some(script) = doc.object_mut(&script_id) else {
            continue;
        };
        let Some(inputs) = script.value("luaInputs").and_then(Value::as_table).cloned() else {
            continue;
        };
        script.rename("luaInputs", "inputs");
        if doc.contains(&interface_id) {
            log::warn!("Interface '{}' for script '{}' already exists", interface_id, script_id);
            continue;
        }

        let Some(script) = doc.object(&script_id) else {
            continue;
        };
        let uri = interface_uri(script.value("uri").and_then(Value::as_str), &interface_id);
        let mut interface = IrObject::new(
            interface_id.clone(),
            "LuaInterface",
            format!("{} Interface", script.name()),
        );
        interface.set("uri", Property::new(uri.clone()));
        interface.set("inputs", Property::new(interface_inputs(&inputs)));

        doc.generated_files.push(GeneratedFile {
            relative_path: uri,
            contents: interface_source(&inputs),
        });

        let inline = path_of(["luaInputs"]);
        let renamed = path_of(["inputs"]);
        for link in &mut doc.links {
            if link.ends_at(&script_id, &inline) {
                link.end_object = interface_id.clone();
                link.end_path[0] = PathSegment::from("inputs");
            }
        }
        doc.replace_link_prefix(&script_id, &inline, &renamed);
        for name in inputs.names() {
            let path = vec![PathSegment::from("inputs"), PathSegment::from(name)];
            doc.links.push(IrLink::new(interface_id.clone(), path.clone(), script_id.clone(), path));
        }

        let position = doc
            .objects
            .iter()
            .position(|o| o.id == script_id)
            .map_or(doc.objects.len(), |p| p + 1);
        doc.objects.insert(position, interface);
        add_sibling_after(&mut doc, &script_id, &interface_id)?;
    }
    Ok(doc)
}

/// Derive the interface file path from the script path
fn interface_uri(script_uri: Option<&str>, interface_id: &ObjectId) -> String {
    match script_uri.filter(|uri| !uri.is_empty()) {
        Some(uri) => {
            let (dir, file) = uri.rsplit_once('/').unwrap_or(("", uri));
            let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
            if dir.is_empty() {
                format!("{}.interface", stem)
            } else {
                format!("{}/{}.interface", dir, stem)
            }
        }
        None => format!("interfaces/{}.interface", interface_id),
    }
}

/// Interface inputs accept and produce links
fn interface_inputs(inputs: &Table) -> Table {
    let mut table = Table::new();
    for (name, property) in inputs.iter() {
        let mut property = property.clone();
        property.set_annotation(Annotation::Link {
            capability: LinkCapability::StartAndEnd,
        });
        table.set(name, property);
    }
    table
}

fn lua_type(value: &Value) -> String {
    match value {
        Value::Bool(_) => "Type:Bool()".to_string(),
        Value::Int(_) => "Type:Int32()".to_string(),
        Value::Int64(_) => "Type:Int64()".to_string(),
        Value::Double(_) => "Type:Float()".to_string(),
        Value::String(_) => "Type:String()".to_string(),
        Value::Struct(s) => format!("Type:{}()", s.type_name()),
        Value::Array(a) => {
            let element = a.get(0).map_or_else(|| "Type:Float()".to_string(), |p| lua_type(&p.value));
            format!("Type:Array({}, {})", a.len(), element)
        }
        Value::Table(t) => {
            let fields: Vec<String> = t
                .iter()
                .map(|(name, p)| format!("{} = {}", name, lua_type(&p.value)))
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
        Value::Ref(_) => "Type:Int32()".to_string(),
    }
}

/// Source text of the synthesised interface file
fn interface_source(inputs: &Table) -> String {
    let mut source = String::from("function interface(IN)\n");
    for (name, property) in inputs.iter() {
        source.push_str(&format!("    IN.{} = {}\n", name, lua_type(&property.value)));
    }
    source.push_str("end\n");
    source
}

fn add_sibling_after(doc: &mut IrDocument, sibling: &ObjectId, new: &ObjectId) -> Result<(), MigrationError> {
    let Some(parent) = doc.parent_of(sibling) else {
        return Ok(());
    };
    let Some(children) = doc
        .object_mut(&parent)
        .and_then(|p| p.properties.get_mut("children"))
        .and_then(|p| p.value.as_array_mut())
    else {
        return Ok(());
    };
    let index = children
        .iter()
        .position(|c| c.value.as_ref_id() == Some(sibling))
        .map_or(children.len(), |i| i + 1);
    children
        .insert(index, Property::new(new.clone()))
        .map_err(|source| MigrationError::Value {
            version: VERSION,
            source,
        })
}
