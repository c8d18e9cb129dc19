//! Minimal XML-RPC encoding for catalog queries.

use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Nil,
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Double(d) => Some(*d as i64),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault { code: i64, message: String },
}

/// Encode a `methodCall` document.
pub fn method_call(method: &str, params: &[Value]) -> String {
    let mut body = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    body.push_str(&quick_xml::escape::escape(method));
    body.push_str("</methodName><params>");
    for param in params {
        body.push_str("<param>");
        encode_value(param, &mut body);
        body.push_str("</param>");
    }
    body.push_str("</params></methodCall>");
    body
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Str(s) => {
            out.push_str("<string>");
            out.push_str(&quick_xml::escape::escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        Value::Nil => out.push_str("<nil/>"),
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&quick_xml::escape::escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<Node, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(Node {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Node::default()
            }),
            Event::Empty(e) => {
                let node = Node {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Node::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unbalanced closing tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".into());
    }
    root.ok_or_else(|| "empty document".into())
}

fn decode_value(node: &Node) -> Result<Value, String> {
    let Some(typed) = node.children.first() else {
        return Ok(Value::Str(node.text.clone()));
    };
    let text = typed.text.trim();
    let value = match typed.name.as_str() {
        "string" | "dateTime.iso8601" | "base64" => Value::Str(typed.text.clone()),
        "int" | "i4" | "i8" => Value::Int(text.parse().map_err(|_| format!("bad integer '{text}'"))?),
        "boolean" => Value::Bool(text == "1"),
        "double" => Value::Double(text.parse().map_err(|_| format!("bad double '{text}'"))?),
        "nil" => Value::Nil,
        "array" => {
            let data = typed.child("data").ok_or("array without data")?;
            Value::Array(
                data.children
                    .iter()
                    .filter(|c| c.name == "value")
                    .map(decode_value)
                    .collect::<Result<_, _>>()?,
            )
        }
        "struct" => Value::Struct(
            typed
                .children
                .iter()
                .filter(|c| c.name == "member")
                .map(|m| -> Result<(String, Value), String> {
                    let name = m.child("name").ok_or("member without name")?.text.clone();
                    let value = decode_value(m.child("value").ok_or("member without value")?)?;
                    Ok((name, value))
                })
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(format!("unknown value type '{other}'")),
    };
    Ok(value)
}

pub fn parse_response(xml: &str) -> Result<MethodResponse, String> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(format!("unexpected root element '{}'", root.name));
    }

    if let Some(fault) = root.child("fault") {
        let value = decode_value(fault.child("value").ok_or("fault without value")?)?;
        let code = value.member("faultCode").and_then(Value::as_int).unwrap_or(0);
        let message = value
            .member("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(MethodResponse::Fault { code, message });
    }

    let value = root
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
        .ok_or("response without a value")?;
    decode_value(value).map(MethodResponse::Success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_changelog_call() {
        let body = method_call("changelog", &[Value::Int(1_700_000_000)]);
        assert_eq!(
            body,
            "<?xml version=\"1.0\"?><methodCall><methodName>changelog</methodName>\
             <params><param><value><int>1700000000</int></value></param></params></methodCall>"
        );
    }

    #[test]
    fn decodes_nested_arrays() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><array><data>
<value><array><data>
<value><string>alpha</string></value>
<value><string>1.0</string></value>
<value><int>1700000100</int></value>
<value><string>add source file alpha-1.0.tar.gz</string></value>
</data></array></value>
<value><array><data>
<value>beta</value>
<value><nil/></value>
<value><i4>1700000200</i4></value>
<value>create &amp; register</value>
</data></array></value>
</data></array></value>
</param>
</params>
</methodResponse>"#;

        let MethodResponse::Success(value) = parse_response(xml).unwrap() else {
            panic!("expected success");
        };
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows[0].as_array().unwrap();
        assert_eq!(first[0].as_str(), Some("alpha"));
        assert_eq!(first[2].as_int(), Some(1_700_000_100));
        let second = rows[1].as_array().unwrap();
        assert_eq!(second[1], Value::Nil);
        assert_eq!(second[3].as_str(), Some("create & register"));
    }

    #[test]
    fn decodes_fault() {
        let xml = "<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>-32500</int></value></member>\
                   <member><name>faultString</name><value><string>boom</string></value></member>\
                   </struct></value></fault></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            MethodResponse::Fault {
                code: -32500,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_response("<html><body>502</body></html>").is_err());
        assert!(parse_response("").is_err());
    }
}
