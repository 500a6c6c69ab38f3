//! The dispatcher — single entry point for declared LLM calls.
//!
//! For each call: resolve the descriptor, send it through the transport,
//! coerce the reply. A resolve failure returns before the transport is
//! touched. Transport failures come back as [`InvocationError::Upstream`]
//! with their cause intact; nothing is retried or cached here.
//!
//! Application code usually wraps a dispatcher in its own type and exposes
//! one method per operation, each forwarding to a [`BoundOperation`]:
//!
//! ```no_run
//! use llm_mapper::{BoundOperation, Dispatcher, InvocationError, SpecError};
//! use serde_json::json;
//!
//! struct GreetingClient {
//!     greet: BoundOperation<String>,
//! }
//!
//! impl GreetingClient {
//!     fn new(dispatcher: &Dispatcher) -> Result<Self, SpecError> {
//!         Ok(Self { greet: dispatcher.bind("greet")? })
//!     }
//!
//!     async fn greet(&self, name: &str) -> Result<String, InvocationError> {
//!         self.greet.call(vec![json!(name)]).await
//!     }
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::declaration::{ClientSpec, OperationSpec};
use crate::error::{InvocationError, SpecError};
use crate::llm::Transport;
use crate::output::parser::StructuredParser;
use crate::output::{
    coerce, JsonSchemaFormatter, JsonStructuredParser, Output, ReturnType, SchemaFormatter,
};
use crate::prompt::resolve;

/// Serves every operation of one client spec.
///
/// Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<ClientSpec>,
    transport: Arc<dyn Transport>,
    formatter: Arc<dyn SchemaFormatter>,
    parser: Arc<dyn StructuredParser>,
}

impl Dispatcher {
    /// Creates a dispatcher using JSON Schema format instructions and
    /// JSON structured parsing.
    pub fn new(client: Arc<ClientSpec>, transport: Arc<dyn Transport>) -> Self {
        Self {
            client,
            transport,
            formatter: Arc::new(JsonSchemaFormatter),
            parser: Arc::new(JsonStructuredParser),
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn SchemaFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn StructuredParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn client(&self) -> &ClientSpec {
        &self.client
    }

    /// Invokes the operation named `operation`.
    pub async fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Output, InvocationError> {
        let op = self
            .client
            .operation(operation)
            .ok_or_else(|| SpecError::UnknownOperation(operation.to_string()))?;
        self.invoke_operation(op, &args).await
    }

    /// Invokes `op` with this dispatcher's client settings.
    pub async fn invoke_operation(
        &self,
        op: &OperationSpec,
        args: &[Value],
    ) -> Result<Output, InvocationError> {
        let descriptor = match resolve(op, &self.client, args, self.formatter.as_ref()) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Rejected call to {}.{}: {e}", self.client.name, op.name);
                return Err(e.into());
            }
        };

        debug!(
            "Dispatching {}.{} via {}",
            self.client.name,
            op.name,
            self.transport.description()
        );

        let raw = self
            .transport
            .send(&descriptor.messages, self.client.model_name.as_deref())
            .await
            .map_err(InvocationError::Upstream)?;

        debug!("{}.{} returned {} chars", self.client.name, op.name, raw.len());

        Ok(coerce(raw, &descriptor.return_shape, self.parser.as_ref())?)
    }

    /// Binds an operation to a typed forwarding handle.
    ///
    /// Fails if the operation does not exist or its declared return shape
    /// cannot produce `R`.
    pub fn bind<R: ReturnType>(&self, operation: &str) -> Result<BoundOperation<R>, SpecError> {
        let op = self
            .client
            .operation(operation)
            .ok_or_else(|| SpecError::UnknownOperation(operation.to_string()))?;
        if !R::accepts(&op.return_shape) {
            return Err(SpecError::ReturnShapeMismatch {
                operation: op.name.clone(),
                declared: op.return_shape.label(),
                requested: R::label(),
            });
        }
        Ok(BoundOperation {
            dispatcher: self.clone(),
            operation: Arc::clone(op),
            _returns: PhantomData,
        })
    }
}

/// One operation of a client, bound to its dispatcher and return type.
pub struct BoundOperation<R> {
    dispatcher: Dispatcher,
    operation: Arc<OperationSpec>,
    _returns: PhantomData<fn() -> R>,
}

impl<R> Clone for BoundOperation<R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            operation: Arc::clone(&self.operation),
            _returns: PhantomData,
        }
    }
}

impl<R: ReturnType> BoundOperation<R> {
    pub async fn call(&self, args: impl Into<Vec<Value>>) -> Result<R, InvocationError> {
        let args = args.into();
        let output = self
            .dispatcher
            .invoke_operation(&self.operation, &args)
            .await?;
        Ok(R::from_output(output)?)
    }

    pub fn operation(&self) -> &OperationSpec {
        &self.operation
    }
}

/// Positional call arguments encoded from any `Serialize` value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, SpecError> {
        let encoded = serde_json::to_value(value).map_err(|e| SpecError::UnencodableArgument {
            index: self.0.len(),
            reason: e.to_string(),
        })?;
        self.0.push(encoded);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Args> for Vec<Value> {
    fn from(args: Args) -> Self {
        args.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{
        build_client, ClientDeclaration, OperationDeclaration, ParamDeclaration, ReturnShape,
    };
    use crate::llm::{Message, Role};
    use crate::output::Json;
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport returning a canned reply and recording every request.
    struct Recording {
        reply: anyhow::Result<String>,
        calls: Mutex<Vec<(Vec<Message>, Option<String>)>>,
    }

    impl Recording {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!(message.to_string())),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn send(&self, messages: &[Message], model_hint: Option<&str>) -> anyhow::Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), model_hint.map(String::from)));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }

        fn description(&self) -> String {
            "recording (test)".to_string()
        }
    }

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct ActorInfo {
        name: String,
        most_famous_movie: String,
        age: u32,
    }

    fn spec() -> Arc<ClientSpec> {
        let decl = ClientDeclaration::new("GreetingService")
            .model("gpt-3.5-turbo")
            .system_message("You are a friendly assistant that greets people warmly.")
            .operation(
                OperationDeclaration::new("greet", "Hello, {name}! How are you today?")
                    .param(ParamDeclaration::named("name")),
            )
            .operation(
                OperationDeclaration::new("actor_info", "Tell me about {name}.")
                    .param(ParamDeclaration::named("name"))
                    .returns(ReturnShape::structured::<ActorInfo>()),
            )
            .operation(
                OperationDeclaration::new("note", "Remember {0}.")
                    .param(ParamDeclaration::positional())
                    .returns(ReturnShape::Void),
            );
        Arc::new(build_client(decl).unwrap())
    }

    // ── invoke ──────────────────────────────────────────

    #[tokio::test]
    async fn test_invoke_text_operation() {
        let transport = Recording::replying("Hi there, Iron Man!");
        let dispatcher = Dispatcher::new(spec(), transport.clone());

        let out = dispatcher.invoke("greet", vec![json!("Iron Man")]).await.unwrap();
        assert_eq!(out, Output::Text("Hi there, Iron Man!".to_string()));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (messages, hint) = &calls[0];
        assert_eq!(hint.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Hello, Iron Man! How are you today?");
    }

    #[tokio::test]
    async fn test_invoke_void_operation() {
        let transport = Recording::replying("Noted!");
        let dispatcher = Dispatcher::new(spec(), transport.clone());
        let out = dispatcher.invoke("note", vec![json!("milk")]).await.unwrap();
        assert_eq!(out, Output::Unit);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_spec_errors_never_reach_transport() {
        let transport = Recording::replying("unused");
        let dispatcher = Dispatcher::new(spec(), transport.clone());

        let err = dispatcher.invoke("greet", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            InvocationError::Spec(SpecError::ArityMismatch { expected: 1, actual: 0, .. })
        ));

        let err = dispatcher.invoke("farewell", vec![]).await.unwrap_err();
        assert!(matches!(err, InvocationError::Spec(SpecError::UnknownOperation(_))));

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through() {
        let transport = Recording::failing("Claude API error (429): rate limited");
        let dispatcher = Dispatcher::new(spec(), transport.clone());
        let err = dispatcher.invoke("greet", vec![json!("Tony")]).await.unwrap_err();
        assert!(err.is_upstream_error());
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_structured_prose_is_coercion_error() {
        let transport = Recording::replying("Tom Cruise starred in Top Gun.");
        let dispatcher = Dispatcher::new(spec(), transport);
        let err = dispatcher
            .invoke("actor_info", vec![json!("Tom Cruise")])
            .await
            .unwrap_err();
        match err {
            InvocationError::Coercion(e) => assert_eq!(e.raw_text(), "Tom Cruise starred in Top Gun."),
            other => panic!("expected coercion error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_structured_request_carries_format_instruction() {
        let transport = Recording::replying(
            r#"{"name": "Tom Cruise", "mostFamousMovie": "Top Gun", "age": 62}"#,
        );
        let dispatcher = Dispatcher::new(spec(), transport.clone());
        dispatcher
            .invoke("actor_info", vec![json!("Tom Cruise")])
            .await
            .unwrap();
        let calls = transport.calls.lock().unwrap();
        let user = &calls[0].0[1].content;
        assert!(user.starts_with(
            "Tell me about Tom Cruise.\n\nYour response should be in JSON format."
        ));
        assert!(user.contains("mostFamousMovie"));
    }

    #[tokio::test]
    async fn test_custom_formatter_and_parser() {
        struct Short;
        impl SchemaFormatter for Short {
            fn describe(&self, schema: &crate::declaration::Schema) -> String {
                format!("Reply as {}.", schema.name)
            }
        }
        struct Fixed;
        impl StructuredParser for Fixed {
            fn parse(
                &self,
                _: &str,
                _: &crate::declaration::Schema,
            ) -> Result<Value, crate::error::ParseError> {
                Ok(json!({"name": "X", "mostFamousMovie": "Y", "age": 1}))
            }
        }

        let transport = Recording::replying("not json at all");
        let dispatcher = Dispatcher::new(spec(), transport.clone())
            .with_formatter(Arc::new(Short))
            .with_parser(Arc::new(Fixed));
        let out = dispatcher
            .invoke("actor_info", vec![json!("Tom")])
            .await
            .unwrap();
        assert_eq!(out.as_value().unwrap()["age"], 1);
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0[1].content, "Tell me about Tom.\n\nReply as ActorInfo.");
    }

    #[tokio::test]
    async fn test_concurrent_invocations_share_dispatcher() {
        let transport = Recording::replying("ok");
        let dispatcher = Dispatcher::new(spec(), transport.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let d = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                d.invoke("greet", vec![json!(format!("guest {i}"))]).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let calls = transport.calls.lock().unwrap();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (messages, _) in calls.iter() {
            *seen.entry(messages[1].content.clone()).or_default() += 1;
        }
        assert_eq!(seen.len(), 8);
        assert!(seen.values().all(|&n| n == 1));
    }

    // ── bind ────────────────────────────────────────────

    #[tokio::test]
    async fn test_bound_text_operation() {
        let dispatcher = Dispatcher::new(spec(), Recording::replying("Hello!"));
        let greet: BoundOperation<String> = dispatcher.bind("greet").unwrap();
        assert_eq!(greet.operation().name, "greet");
        assert_eq!(greet.call(vec![json!("Iron Man")]).await.unwrap(), "Hello!");
    }

    #[tokio::test]
    async fn test_bound_structured_operation() {
        let transport = Recording::replying(
            "```json\n{\"name\": \"Tom Cruise\", \"mostFamousMovie\": \"Top Gun\", \"age\": 62}\n```",
        );
        let dispatcher = Dispatcher::new(spec(), transport);
        let actor_info: BoundOperation<Json<ActorInfo>> = dispatcher.bind("actor_info").unwrap();
        let actor = actor_info
            .call(Args::new().with("Tom Cruise").unwrap())
            .await
            .unwrap();
        assert_eq!(actor.name, "Tom Cruise");
        assert_eq!(actor.most_famous_movie, "Top Gun");
        assert_eq!(actor.age, 62);
    }

    #[test]
    fn test_bind_rejects_shape_mismatch() {
        let dispatcher = Dispatcher::new(spec(), Recording::replying(""));
        let err = dispatcher.bind::<String>("actor_info").err().unwrap();
        assert_eq!(
            err,
            SpecError::ReturnShapeMismatch {
                operation: "actor_info".to_string(),
                declared: "structured ActorInfo".to_string(),
                requested: "text".to_string(),
            }
        );
        assert!(dispatcher.bind::<Value>("actor_info").is_ok());
        assert!(dispatcher.bind::<()>("note").is_ok());
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Weather {
        city: String,
        celsius: f64,
    }

    #[test]
    fn test_bind_rejects_other_structured_type() {
        let transport = Recording::replying("unused");
        let dispatcher = Dispatcher::new(spec(), transport.clone());
        let err = dispatcher.bind::<Json<Weather>>("actor_info").err().unwrap();
        assert_eq!(
            err,
            SpecError::ReturnShapeMismatch {
                operation: "actor_info".to_string(),
                declared: "structured ActorInfo".to_string(),
                requested: "structured Weather".to_string(),
            }
        );
        assert!(dispatcher.bind::<Json<ActorInfo>>("actor_info").is_ok());
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_bind_unknown_operation() {
        let dispatcher = Dispatcher::new(spec(), Recording::replying(""));
        let err = dispatcher.bind::<String>("farewell").err().unwrap();
        assert_eq!(err, SpecError::UnknownOperation("farewell".to_string()));
    }

    // ── Args ────────────────────────────────────────────

    #[test]
    fn test_args_encoding() {
        let args = Args::new()
            .with("Ada")
            .unwrap()
            .with(&36)
            .unwrap()
            .with(&vec!["math", "poetry"])
            .unwrap();
        assert_eq!(args.len(), 3);
        let values: Vec<Value> = args.into();
        assert_eq!(values, vec![json!("Ada"), json!(36), json!(["math", "poetry"])]);
    }

    #[test]
    fn test_args_unencodable_value() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON");
        let err = Args::new().with("ok").unwrap().with(&map).unwrap_err();
        assert!(matches!(err, SpecError::UnencodableArgument { index: 1, .. }));
    }
}
