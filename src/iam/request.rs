//! Evaluation request

use serde_json::Value;

/// Who is doing what to which resource, plus attributes for conditions
///
/// Fields a statement shape does not use are ignored: an action-based
/// policy only looks at `action` and `context`.
///
/// ```
/// use iam_engine::iam::Request;
/// use serde_json::json;
///
/// let ctx = json!({ "user": { "id": 1 } });
/// let request = Request::new("read")
///     .resource("secrets:1:token")
///     .principal("alice")
///     .context(&ctx);
/// assert_eq!(request.resource, Some("secrets:1:token"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Request<'a> {
    pub action: &'a str,
    pub resource: Option<&'a str>,
    pub principal: Option<&'a str>,
    pub principal_type: Option<&'a str>,
    pub context: Option<&'a Value>,
}

impl<'a> Request<'a> {
    pub fn new(action: &'a str) -> Self {
        Request {
            action,
            ..Default::default()
        }
    }

    pub fn resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn principal(mut self, principal: &'a str) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Qualify the principal, e.g. `"AWS"` for `{ "AWS": [...] }` principal maps
    pub fn principal_type(mut self, principal_type: &'a str) -> Self {
        self.principal_type = Some(principal_type);
        self
    }

    pub fn context(mut self, context: &'a Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Use `fallback` when the request carries no context of its own
    pub(crate) fn or_context(self, fallback: Option<&'a Value>) -> Self {
        Request {
            context: self.context.or(fallback),
            ..self
        }
    }
}
