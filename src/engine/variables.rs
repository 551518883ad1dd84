//! Per-context variable store
//!
//! Holds semantic values (`serde_json::Value`) seeded from the context
//! definition and extended by step captures. `$NAME` and `${NAME}` tokens in
//! step fields resolve against the store first, then the process
//! environment. `$$` is never treated as a reference outside capture maps.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use indexmap::IndexMap;

use crate::suite::{Click, Find, GoTo, HttpRequest, RunCode, RunShell, StepAction, TypeKeys};

use super::failure::{CaptureFailure, StepFailure};
use super::path::{JsonPath, Lookup};

/// Prefix marking an outcome path inside a capture map
pub const OUTCOME_PREFIX: &str = "$$";

/// Key/value state owned by a single context
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, Value>,
    use_environment: bool,
}

impl VariableStore {
    /// Create a store seeded with initial values, falling back to the environment
    pub fn new(seed: &Map<String, Value>) -> Self {
        Self {
            values: seed.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            use_environment: true,
        }
    }

    /// Disable the process environment fallback
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    /// Current value of `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        if self.use_environment {
            return std::env::var(name).ok().map(Value::String);
        }
        None
    }

    /// Set `name`, overwriting any previous value
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve every reference in a string
    ///
    /// A string consisting of exactly one reference yields the stored value
    /// unchanged, so numbers and objects keep their type. Anything else is
    /// interpolated as text.
    pub fn resolve_str(&self, input: &str) -> Result<Value, StepFailure> {
        let tokens = tokenize(input);
        if let [Token::Reference(name)] = tokens.as_slice() {
            return self.get(name).ok_or_else(|| StepFailure::unresolved(name));
        }

        let mut out = String::with_capacity(input.len());
        for token in tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Reference(name) => {
                    let value = self.get(name).ok_or_else(|| StepFailure::unresolved(name))?;
                    out.push_str(&as_text(&value));
                }
            }
        }
        Ok(Value::String(out))
    }

    /// Resolve references inside every string of a value; keys are untouched
    pub fn resolve_value(&self, value: &Value) -> Result<Value, StepFailure> {
        match value {
            Value::String(s) => self.resolve_str(s),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| self.resolve_value(v).map(|v| (k.clone(), v)))
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    /// Resolve references in every string field of a step action
    ///
    /// String fields receive the text form of a reference. Free-form JSON
    /// fields (`requestData`, `responseHeaders`, `responseData`) keep the
    /// stored value's type.
    pub fn resolve_action(&self, action: &StepAction) -> Result<StepAction, StepFailure> {
        let resolved = match action {
            StepAction::RunShell(shell) => StepAction::RunShell(RunShell {
                command: self.resolve_text(&shell.command)?,
                args: self.resolve_texts(&shell.args)?,
                exit_codes: shell.exit_codes.clone(),
                stdio: self.resolve_optional(shell.stdio.as_deref())?,
                working_directory: self.resolve_optional(shell.working_directory.as_deref())?,
            }),
            StepAction::RunCode(code) => StepAction::RunCode(RunCode {
                language: self.resolve_text(&code.language)?,
                code: self.resolve_text(&code.code)?,
                args: self.resolve_texts(&code.args)?,
                exit_codes: code.exit_codes.clone(),
                stdio: self.resolve_optional(code.stdio.as_deref())?,
                working_directory: self.resolve_optional(code.working_directory.as_deref())?,
            }),
            StepAction::HttpRequest(http) => StepAction::HttpRequest(HttpRequest {
                url: self.resolve_text(&http.url)?,
                method: self.resolve_text(&http.method)?,
                request_headers: self.resolve_text_map(&http.request_headers)?,
                request_params: self.resolve_text_map(&http.request_params)?,
                request_data: http
                    .request_data
                    .as_ref()
                    .map(|data| self.resolve_value(data))
                    .transpose()?,
                status_codes: http.status_codes.clone(),
                response_headers: http
                    .response_headers
                    .iter()
                    .map(|(k, v)| self.resolve_value(v).map(|v| (k.clone(), v)))
                    .collect::<Result<Map<_, _>, _>>()?,
                response_data: http
                    .response_data
                    .as_ref()
                    .map(|data| self.resolve_value(data))
                    .transpose()?,
            }),
            StepAction::GoTo(go) => StepAction::GoTo(GoTo {
                url: self.resolve_text(&go.url)?,
            }),
            StepAction::Find(find) => StepAction::Find(Find {
                selector: self.resolve_text(&find.selector)?,
                match_text: self.resolve_optional(find.match_text.as_deref())?,
            }),
            StepAction::Click(click) => StepAction::Click(Click {
                selector: self.resolve_text(&click.selector)?,
            }),
            StepAction::TypeKeys(keys) => StepAction::TypeKeys(TypeKeys {
                keys: self.resolve_texts(&keys.keys)?,
                selector: self.resolve_optional(keys.selector.as_deref())?,
            }),
            StepAction::Wait(wait) => StepAction::Wait(wait.clone()),
        };
        Ok(resolved)
    }

    /// Resolve a string-typed field; whole references become their text form
    pub fn resolve_text(&self, input: &str) -> Result<String, StepFailure> {
        self.resolve_str(input).map(|value| as_text(&value))
    }

    fn resolve_optional(&self, input: Option<&str>) -> Result<Option<String>, StepFailure> {
        input.map(|s| self.resolve_text(s)).transpose()
    }

    fn resolve_texts(&self, items: &[String]) -> Result<Vec<String>, StepFailure> {
        items.iter().map(|item| self.resolve_text(item)).collect()
    }

    fn resolve_text_map(
        &self,
        map: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, StepFailure> {
        map.iter()
            .map(|(k, v)| self.resolve_text(v).map(|v| (k.clone(), v)))
            .collect()
    }

    /// Evaluate a capture map against an outcome and store the results
    ///
    /// Captures run in declaration order, so a later expression can use a
    /// value captured earlier in the same step. Returns the captured values
    /// and any captures that failed. Failed captures leave the store
    /// unchanged for that name.
    pub fn capture(
        &mut self,
        captures: &IndexMap<String, String>,
        outcome: &Value,
    ) -> (Map<String, Value>, Vec<CaptureFailure>) {
        let mut captured = Map::new();
        let mut failures = Vec::new();

        for (name, expression) in captures {
            match self.evaluate_capture(expression, outcome) {
                Ok(value) => {
                    self.set(name.clone(), value.clone());
                    captured.insert(name.clone(), value);
                }
                Err(reason) => failures.push(CaptureFailure {
                    variable: name.clone(),
                    expression: expression.clone(),
                    reason,
                }),
            }
        }

        (captured, failures)
    }

    fn evaluate_capture(&self, expression: &str, outcome: &Value) -> Result<Value, String> {
        match expression.strip_prefix(OUTCOME_PREFIX) {
            Some(path) => {
                let path = JsonPath::parse(path).map_err(|e| e.to_string())?;
                match path.lookup(outcome) {
                    Lookup::Found(value) => Ok(value.clone()),
                    Lookup::Missing { at } if at.is_empty() => {
                        Err(format!("path '{}' not found in outcome", path))
                    }
                    Lookup::Missing { at } => Err(format!(
                        "path '{}' not found in outcome (resolved up to '{}')",
                        path, at
                    )),
                }
            }
            None => self.resolve_str(expression).map_err(|f| f.message),
        }
    }
}

/// Text form used for interpolation
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Reference(&'a str),
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Split a string into literal text and `$NAME` / `${NAME}` references
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        // `$$...` is an outcome path, kept literally
        if bytes.get(i + 1) == Some(&b'$') {
            i += 2;
            while i < bytes.len() && bytes[i] != b'$' && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            continue;
        }

        let (name_start, name_end, token_end) = if bytes.get(i + 1) == Some(&b'{') {
            match input[i + 2..].find('}') {
                Some(offset) => {
                    let end = i + 2 + offset;
                    let name = &bytes[i + 2..end];
                    if !name.is_empty()
                        && is_name_start(name[0])
                        && name.iter().all(|&c| is_name_char(c))
                    {
                        (i + 2, end, end + 1)
                    } else {
                        i += 1;
                        continue;
                    }
                }
                None => {
                    i += 1;
                    continue;
                }
            }
        } else if bytes.get(i + 1).map_or(false, |&c| is_name_start(c)) {
            let mut end = i + 2;
            while end < bytes.len() && is_name_char(bytes[end]) {
                end += 1;
            }
            (i + 1, end, end)
        } else {
            i += 1;
            continue;
        };

        if text_start < i {
            tokens.push(Token::Text(&input[text_start..i]));
        }
        tokens.push(Token::Reference(&input[name_start..name_end]));
        i = token_end;
        text_start = token_end;
    }

    if text_start < bytes.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::failure::FailureKind;
    use serde_json::json;

    fn store(seed: Value) -> VariableStore {
        let map = seed.as_object().cloned().unwrap_or_default();
        VariableStore::new(&map).without_environment()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Bearer $TOKEN!"),
            vec![
                Token::Text("Bearer "),
                Token::Reference("TOKEN"),
                Token::Text("!")
            ]
        );
        assert_eq!(
            tokenize("${HOST}:8080"),
            vec![Token::Reference("HOST"), Token::Text(":8080")]
        );
        assert_eq!(tokenize("cost $5"), vec![Token::Text("cost $5")]);
        assert_eq!(
            tokenize("$$response.body.id"),
            vec![Token::Text("$$response.body.id")]
        );
    }

    #[test]
    fn test_whole_reference_keeps_type() {
        let vars = store(json!({ "ID": 7, "USER": { "name": "george" } }));
        assert_eq!(vars.resolve_str("$ID").unwrap(), json!(7));
        assert_eq!(vars.resolve_str("${USER}").unwrap(), json!({ "name": "george" }));
        assert_eq!(
            vars.resolve_str("/users/$ID").unwrap(),
            json!("/users/7")
        );
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let vars = store(json!({}));
        let failure = vars.resolve_str("echo $MISSING").unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnresolvedVariable);
        assert!(failure.message.contains("MISSING"));
    }

    #[test]
    fn test_environment_fallback() {
        let vars = VariableStore::new(&Map::new());
        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(vars.resolve_str("$PATH").unwrap(), json!(path));
        }
    }

    #[test]
    fn test_resolve_action_numeric_value_into_string_field() {
        let vars = store(json!({ "ID": 7, "BASE": "https://api.test" }));
        let action: StepAction = serde_json::from_value(json!({
            "httpRequest": {
                "url": "$BASE/users/$ID",
                "requestData": { "id": "$ID" }
            }
        }))
        .unwrap();

        let resolved = vars.resolve_action(&action).unwrap();
        match resolved {
            StepAction::HttpRequest(http) => {
                assert_eq!(http.url, "https://api.test/users/7");
                assert_eq!(http.request_data, Some(json!({ "id": 7 })));
            }
            other => panic!("unexpected action {:?}", other),
        }

        let action: StepAction =
            serde_json::from_value(json!({ "goTo": { "url": "$ID" } })).unwrap();
        match vars.resolve_action(&action).unwrap() {
            StepAction::GoTo(go) => assert_eq!(go.url, "7"),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_header_and_body_share_numeric_variable() {
        let vars = store(json!({ "ID": 7 }));
        let action: StepAction = serde_json::from_value(json!({
            "httpRequest": {
                "url": "https://api.test/users",
                "method": "post",
                "requestHeaders": { "X-User": "$ID" },
                "requestParams": { "page": "${ID}" },
                "requestData": { "id": "$ID", "tags": ["$ID"] },
                "responseData": { "id": "$ID" }
            }
        }))
        .unwrap();

        match vars.resolve_action(&action).unwrap() {
            StepAction::HttpRequest(http) => {
                assert_eq!(http.request_headers["X-User"], "7");
                assert_eq!(http.request_params["page"], "7");
                assert_eq!(http.request_data, Some(json!({ "id": 7, "tags": [7] })));
                assert_eq!(http.response_data, Some(json!({ "id": 7 })));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_resolve_action_string_lists() {
        let vars = store(json!({ "N": 3, "WHO": "world" }));
        let action: StepAction = serde_json::from_value(json!({
            "runShell": {
                "command": "echo $WHO",
                "args": ["$N", "x$N"],
                "exitCodes": [0, 1],
                "stdio": "$WHO"
            }
        }))
        .unwrap();

        match vars.resolve_action(&action).unwrap() {
            StepAction::RunShell(shell) => {
                assert_eq!(shell.command, "echo world");
                assert_eq!(shell.args, vec!["3", "x3"]);
                assert_eq!(shell.exit_codes, vec![0, 1]);
                assert_eq!(shell.stdio.as_deref(), Some("world"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_capture_from_outcome() {
        let mut vars = store(json!({ "USER_ID": 1 }));
        let outcome = json!({ "response": { "body": { "data": [{ "id": 7 }] } } });
        let captures: IndexMap<String, String> = [
            ("USER_ID".to_string(), "$$response.body.data[0].id".to_string()),
            ("MISSING".to_string(), "$$response.body.token".to_string()),
            ("LABEL".to_string(), "user-$USER_ID".to_string()),
        ]
        .into_iter()
        .collect();

        let (captured, failures) = vars.capture(&captures, &outcome);

        assert_eq!(captured["USER_ID"], json!(7));
        assert_eq!(vars.get("USER_ID"), Some(json!(7)));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].variable, "MISSING");
        assert!(failures[0].reason.contains("response.body.token"));
        assert_eq!(vars.get("MISSING"), None);
        // LABEL is declared after USER_ID and sees the captured value
        assert_eq!(captured["LABEL"], json!("user-7"));
    }
}
