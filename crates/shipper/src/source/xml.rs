//! PAN-OS XML API 응답 디코딩
//!
//! 응답 문서를 `serde_json::Value` 트리로 바꿔 JSON 포인터로 조회할 수 있게 합니다.
//!
//! # 변환 규칙
//! - 속성은 `"@이름"` 키
//! - 같은 이름의 자식이 여러 개면 배열, 하나면 그 값 그대로
//! - 속성과 자식이 없는 요소는 텍스트 문자열 (비어 있으면 `""`)
//! - 속성이나 자식이 있는 요소의 텍스트는 `"#text"` 키
//!
//! ```text
//! <response status="success"><result><job>5</job></result></response>
//!   => {"response": {"@status": "success", "result": {"job": "5"}}}
//! ```

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use alertrelay_core::error::SourceError;

/// 변환 중인 요소
struct Element {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, SourceError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(invalid)?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value().map_err(invalid)?;
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let value = if self.fields.is_empty() {
            Value::String(self.text)
        } else {
            let mut fields = self.fields;
            if !self.text.is_empty() {
                fields.insert("#text".to_owned(), Value::String(self.text));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }

    fn push_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            None => {
                self.fields.insert(name, value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
}

fn invalid(e: impl std::fmt::Display) -> SourceError {
    SourceError::Query(format!("invalid xml response: {e}"))
}

/// XML 문서를 `{"<루트>": ...}` 형태의 값으로 변환합니다.
///
/// # Errors
///
/// 문서가 올바른 XML이 아니거나 루트 요소가 없으면 [`SourceError::Query`]입니다.
pub fn xml_to_value(body: &str) -> Result<Value, SourceError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(ref e) => stack.push(Element::open(e)?),
            Event::Empty(ref e) => {
                let (name, value) = Element::open(e)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape().map_err(invalid)?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(invalid("unbalanced closing tag"));
                };
                let (name, value) = element.close();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(invalid("document ended inside an element"));
    }
    let (name, value) = root.ok_or_else(|| invalid("no root element"))?;

    let mut doc = Map::new();
    doc.insert(name, value);
    Ok(Value::Object(doc))
}

/// `<response status="error">`이면 응답의 메시지를 반환합니다.
///
/// 메시지는 `response/msg` 또는 `response/result/msg` 아래의 텍스트입니다.
pub fn api_error(doc: &Value) -> Option<String> {
    if doc.pointer("/response/@status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let mut parts = Vec::new();
    for pointer in ["/response/msg", "/response/result/msg"] {
        if let Some(msg) = doc.pointer(pointer) {
            collect_text(msg, &mut parts);
        }
    }
    if parts.is_empty() {
        Some("unknown error".to_owned())
    } else {
        Some(parts.join(" "))
    }
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(fields) => fields
            .iter()
            .filter(|(key, _)| !key.starts_with('@'))
            .for_each(|(_, item)| collect_text(item, out)),
        _ => {}
    }
}
