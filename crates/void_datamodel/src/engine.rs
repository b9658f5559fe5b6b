//! Engine collaborator interface
//!
//! Script and shader text is never interpreted by the data model. The host
//! supplies an [`EngineInterface`] that turns source text into a typed
//! description of inputs and outputs; object hooks apply that description.
//!
//! [`DeclarationEngine`] is a small reference implementation that reads the
//! interface declaration syntax written by the data model itself:
//!
//! ```text
//! function interface(IN, OUT)
//!     IN.speed = Type:Float()
//!     IN.offset = { x = Type:Int32(), dir = Type:Vec3f() }
//!     OUT.samples = Type:Array(4, Type:Float())
//! end
//! ```
//!
//! and GLSL-style `uniform <type> <name>;` declarations for shaders.

use void_reflection::{Annotation, ArrayValue, Property, StructRegistry, Table, Value, ValueError, ValueType};

/// Type of one interface property
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceType {
    /// A primitive or registered struct type
    Value(ValueType),
    /// Nested named properties
    Table(Vec<PropertyInterface>),
    /// Fixed number of elements of one type
    Array(usize, Box<InterfaceType>),
}

impl InterfaceType {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Value(ty) => ty.clone(),
            Self::Table(_) => ValueType::Table,
            Self::Array(_, element) => ValueType::array(element.value_type()),
        }
    }
}

/// A named input, output or uniform
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInterface {
    pub name: String,
    pub ty: InterfaceType,
}

impl PropertyInterface {
    pub fn new(name: impl Into<String>, ty: InterfaceType) -> Self {
        Self { name: name.into(), ty }
    }

    pub fn value(name: impl Into<String>, ty: ValueType) -> Self {
        Self::new(name, InterfaceType::Value(ty))
    }

    pub fn table(name: impl Into<String>, children: Vec<PropertyInterface>) -> Self {
        Self::new(name, InterfaceType::Table(children))
    }

    /// Build a default-valued property for this description
    pub fn to_property(&self, structs: &StructRegistry) -> Result<Property, ValueError> {
        Ok(Property::new(build_value(&self.ty, structs)?))
    }
}

fn build_value(ty: &InterfaceType, structs: &StructRegistry) -> Result<Value, ValueError> {
    match ty {
        InterfaceType::Value(ty) => structs.default_value(ty),
        InterfaceType::Table(children) => Ok(Value::Table(build_table(children, structs)?)),
        InterfaceType::Array(len, element) => {
            let mut array = ArrayValue::new(element.value_type());
            for _ in 0..*len {
                array.push(Property::new(build_value(element, structs)?))?;
            }
            Ok(Value::Array(array))
        }
    }
}

/// Build a table with one default-valued entry per description
pub fn build_table(properties: &[PropertyInterface], structs: &StructRegistry) -> Result<Table, ValueError> {
    let mut table = Table::new();
    for property in properties {
        table.insert(property.name.clone(), property.to_property(structs)?)?;
    }
    Ok(table)
}

/// Build an interface table, annotating every entry with a link capability
pub fn build_linkable_table(
    properties: &[PropertyInterface],
    structs: &StructRegistry,
    link: &Annotation,
) -> Result<Table, ValueError> {
    let mut table = build_table(properties, structs)?;
    for (_, property) in table.iter_mut() {
        property.set_annotation(link.clone());
    }
    Ok(table)
}

/// Parsed inputs and outputs of a script or interface file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptInterface {
    pub inputs: Vec<PropertyInterface>,
    pub outputs: Vec<PropertyInterface>,
}

/// Parses script and shader sources on behalf of object hooks.
///
/// Calls are synchronous and have no side effects on the document. A
/// failure is a human-readable reason, recorded as a parse error on the
/// object.
pub trait EngineInterface: Send + Sync {
    fn parse_script(&self, source: &str) -> Result<ScriptInterface, String>;

    fn parse_shader(&self, vertex: &str, fragment: &str) -> Result<Vec<PropertyInterface>, String>;
}

/// Engine that accepts everything and reports empty interfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEngine;

impl EngineInterface for NullEngine {
    fn parse_script(&self, _source: &str) -> Result<ScriptInterface, String> {
        Ok(ScriptInterface::default())
    }

    fn parse_shader(&self, _vertex: &str, _fragment: &str) -> Result<Vec<PropertyInterface>, String> {
        Ok(Vec::new())
    }
}

/// Reads interface declarations and uniform declarations
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarationEngine;

impl EngineInterface for DeclarationEngine {
    fn parse_script(&self, source: &str) -> Result<ScriptInterface, String> {
        let tokens = tokenize(source)?;
        DeclarationParser::new(tokens).parse()
    }

    fn parse_shader(&self, vertex: &str, fragment: &str) -> Result<Vec<PropertyInterface>, String> {
        let mut uniforms: Vec<PropertyInterface> = Vec::new();
        for source in [vertex, fragment] {
            for uniform in parse_uniforms(source)? {
                match uniforms.iter().find(|u| u.name == uniform.name) {
                    Some(existing) if existing.ty != uniform.ty => {
                        return Err(format!("Uniform '{}' declared with different types", uniform.name));
                    }
                    Some(_) => {}
                    None => uniforms.push(uniform),
                }
            }
        }
        Ok(uniforms)
    }
}

// ---- declaration syntax -----------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(usize),
    Dot,
    Eq,
    Colon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Other(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
        } else if c.is_whitespace() {
            chars.next();
        } else if c == '-' {
            chars.next();
            if chars.peek() == Some(&'-') {
                // comment to end of line
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            } else {
                tokens.push(Token { kind: TokenKind::Other('-'), line });
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&c) = chars.peek().filter(|c| c.is_ascii_alphanumeric() || **c == '_') {
                ident.push(c);
                chars.next();
            }
            tokens.push(Token { kind: TokenKind::Ident(ident), line });
        } else if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&c) = chars.peek().filter(|c| c.is_ascii_digit()) {
                digits.push(c);
                chars.next();
            }
            let number = digits
                .parse()
                .map_err(|_| format!("Line {}: number '{}' out of range", line, digits))?;
            tokens.push(Token { kind: TokenKind::Number(number), line });
        } else {
            let kind = match c {
                '.' => TokenKind::Dot,
                '=' => TokenKind::Eq,
                ':' => TokenKind::Colon,
                ',' => TokenKind::Comma,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                other => TokenKind::Other(other),
            };
            tokens.push(Token { kind, line });
            chars.next();
        }
    }
    Ok(tokens)
}

struct DeclarationParser {
    tokens: Vec<Token>,
    current: usize,
}

impl DeclarationParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse(&mut self) -> Result<ScriptInterface, String> {
        let mut interface = ScriptInterface::default();
        while self.current < self.tokens.len() {
            let target = match self.peek_ident() {
                Some("IN") if self.peek_kind(1) == Some(&TokenKind::Dot) => &mut interface.inputs,
                Some("OUT") if self.peek_kind(1) == Some(&TokenKind::Dot) => &mut interface.outputs,
                _ => {
                    self.current += 1;
                    continue;
                }
            };
            self.current += 2;
            let name = self.expect_ident()?;
            self.expect(TokenKind::Eq)?;
            let ty = self.type_expr()?;
            if target.iter().any(|p| p.name == name) {
                return Err(format!("Line {}: '{}' declared twice", self.line(), name));
            }
            target.push(PropertyInterface::new(name, ty));
        }
        Ok(interface)
    }

    fn type_expr(&mut self) -> Result<InterfaceType, String> {
        if self.peek_kind(0) == Some(&TokenKind::LBrace) {
            self.current += 1;
            let mut fields: Vec<PropertyInterface> = Vec::new();
            while self.peek_kind(0) != Some(&TokenKind::RBrace) {
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let ty = self.type_expr()?;
                if fields.iter().any(|f| f.name == name) {
                    return Err(format!("Line {}: field '{}' declared twice", self.line(), name));
                }
                fields.push(PropertyInterface::new(name, ty));
                if self.peek_kind(0) == Some(&TokenKind::Comma) {
                    self.current += 1;
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(InterfaceType::Table(fields));
        }

        let namespace = self.expect_ident()?;
        if namespace != "Type" {
            return Err(format!("Line {}: expected 'Type', found '{}'", self.line(), namespace));
        }
        self.expect(TokenKind::Colon)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let ty = if name == "Array" {
            let len = match self.advance() {
                Some(TokenKind::Number(n)) if n > 0 => n,
                _ => return Err(format!("Line {}: expected array size", self.line())),
            };
            self.expect(TokenKind::Comma)?;
            let element = self.type_expr()?;
            InterfaceType::Array(len, Box::new(element))
        } else {
            InterfaceType::Value(
                script_type(&name).ok_or_else(|| format!("Line {}: unknown type '{}'", self.line(), name))?,
            )
        };
        self.expect(TokenKind::RParen)?;
        Ok(ty)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|t| &t.kind)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek_kind(0) {
            Some(TokenKind::Ident(name)) => Some(name),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.current)?.kind.clone();
        self.current += 1;
        Some(token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.current.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |t| t.line)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), String> {
        match self.advance() {
            Some(found) if found == kind => Ok(()),
            Some(found) => Err(format!("Line {}: expected {:?}, found {:?}", self.line(), kind, found)),
            None => Err(format!("Unexpected end of input, expected {:?}", kind)),
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(TokenKind::Ident(name)) => Ok(name),
            Some(found) => Err(format!("Line {}: expected identifier, found {:?}", self.line(), found)),
            None => Err("Unexpected end of input, expected identifier".to_string()),
        }
    }
}

fn script_type(name: &str) -> Option<ValueType> {
    Some(match name {
        "Bool" => ValueType::Bool,
        "Int32" => ValueType::Int,
        "Int64" => ValueType::Int64,
        "Float" => ValueType::Double,
        "String" => ValueType::String,
        "Vec2f" | "Vec3f" | "Vec4f" | "Vec2i" | "Vec3i" | "Vec4i" => ValueType::structure(name),
        _ => return None,
    })
}

fn shader_type(name: &str) -> Option<ValueType> {
    Some(match name {
        "bool" => ValueType::Bool,
        "int" => ValueType::Int,
        "float" => ValueType::Double,
        "vec2" => ValueType::structure("Vec2f"),
        "vec3" => ValueType::structure("Vec3f"),
        "vec4" => ValueType::structure("Vec4f"),
        "ivec2" => ValueType::structure("Vec2i"),
        "ivec3" => ValueType::structure("Vec3i"),
        "ivec4" => ValueType::structure("Vec4i"),
        "sampler2D" | "samplerCube" => ValueType::Ref,
        _ => return None,
    })
}

fn parse_uniforms(source: &str) -> Result<Vec<PropertyInterface>, String> {
    let mut uniforms = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let line = line.split("//").next().unwrap_or_default().trim();
        let Some(declaration) = line.strip_prefix("uniform ") else {
            continue;
        };
        let declaration = declaration.trim_end_matches(';').trim();
        let mut words: Vec<&str> = declaration.split_whitespace().collect();
        words.retain(|w| !matches!(*w, "highp" | "mediump" | "lowp"));
        let [type_name, name] = words[..] else {
            return Err(format!("Line {}: malformed uniform declaration", index + 1));
        };
        let ty = shader_type(type_name)
            .ok_or_else(|| format!("Line {}: unsupported uniform type '{}'", index + 1, type_name))?;
        let interface = match name.split_once('[') {
            Some((name, size)) => {
                let len: usize = size
                    .trim_end_matches(']')
                    .parse()
                    .map_err(|_| format!("Line {}: invalid array size", index + 1))?;
                PropertyInterface::new(name, InterfaceType::Array(len, Box::new(InterfaceType::Value(ty))))
            }
            None => PropertyInterface::value(name, ty),
        };
        uniforms.push(interface);
    }
    Ok(uniforms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_interface() {
        let source = "function interface(IN, OUT)\n\
                      -- inputs\n\
                      IN.speed = Type:Float()\n\
                      IN.offset = { x = Type:Int32(), dir = Type:Vec3f() }\n\
                      OUT.samples = Type:Array(4, Type:Float())\n\
                      end\n";
        let interface = DeclarationEngine.parse_script(source).unwrap();
        assert_eq!(interface.inputs.len(), 2);
        assert_eq!(interface.inputs[0], PropertyInterface::value("speed", ValueType::Double));
        match &interface.inputs[1].ty {
            InterfaceType::Table(fields) => {
                assert_eq!(fields[1], PropertyInterface::value("dir", ValueType::structure("Vec3f")))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            interface.outputs[0].ty,
            InterfaceType::Array(4, Box::new(InterfaceType::Value(ValueType::Double)))
        );
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let error = DeclarationEngine
            .parse_script("function interface(IN)\n  IN.x = Type:Quaternion()\nend")
            .unwrap_err();
        assert!(error.contains("Line 2"), "{}", error);
        assert!(DeclarationEngine.parse_script("IN.x = Type:Float(").is_err());
        assert!(DeclarationEngine
            .parse_script("IN.x = Type:Float()\nIN.x = Type:Bool()")
            .is_err());
    }

    #[test]
    fn test_build_table_defaults() {
        let structs = StructRegistry::with_builtin_types();
        let interface = DeclarationEngine
            .parse_script("IN.v = Type:Vec2i()\nIN.a = Type:Array(2, Type:Bool())")
            .unwrap();
        let table = build_linkable_table(&interface.inputs, &structs, &Annotation::link_end()).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["v", "a"]);
        assert_eq!(table.get("a").unwrap().value.as_array().unwrap().len(), 2);
        assert!(table.get("v").unwrap().link_capability().is_some());
    }

    #[test]
    fn test_parse_shader_uniforms() {
        let error = DeclarationEngine
            .parse_shader("uniform highp mat4 mvp;\n", "uniform vec4 color;")
            .unwrap_err();
        assert!(error.contains("mat4"));

        let uniforms = DeclarationEngine
            .parse_shader("uniform vec4 color;", "uniform float weights[3];")
            .unwrap();
        assert_eq!(
            uniforms[1].ty,
            InterfaceType::Array(3, Box::new(InterfaceType::Value(ValueType::Double)))
        );

        let uniforms = DeclarationEngine
            .parse_shader("uniform float time; // seconds", "uniform float time;\nuniform sampler2D tex;")
            .unwrap();
        assert_eq!(
            uniforms,
            vec![
                PropertyInterface::value("time", ValueType::Double),
                PropertyInterface::value("tex", ValueType::Ref),
            ]
        );
        assert!(DeclarationEngine
            .parse_shader("uniform float a;", "uniform int a;")
            .is_err());
    }
}
