//! Demo tools registered by `purser serve`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use protocol::{ContentBlock, ToolDescriptor};
use server::{HandlerError, Registry, ToolHandler};

use crate::config::EmployeeApiConfig;
use crate::error::Result;

/// Looks up an employee by name.
///
/// With a configured base URL this calls `GET /employees/{name}` on the
/// external API; otherwise it answers locally in the same shape.
pub struct EmployeeLookup {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl EmployeeLookup {
    pub fn new(config: &EmployeeApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            "employee_lookup",
            "Get the employee information from the employee API.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of the employee to look up"
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for EmployeeLookup {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<Vec<ContentBlock>, HandlerError> {
        // Schema validation already guaranteed a string `name`.
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::execution("name missing"))?;

        let text = match &self.base_url {
            Some(base) => {
                let url = format!("{base}/employees/{name}");
                self.http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| HandlerError::execution(e.to_string()))?
                    .error_for_status()
                    .map_err(|e| HandlerError::execution(e.to_string()))?
                    .text()
                    .await
                    .map_err(|e| HandlerError::execution(e.to_string()))?
            }
            None => format!("My name is {name}"),
        };

        Ok(vec![ContentBlock::text(text)])
    }
}

/// Build the registry served by `purser serve`.
pub fn demo_registry(employee_api: &EmployeeApiConfig) -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(
        EmployeeLookup::descriptor(),
        Arc::new(EmployeeLookup::new(employee_api)),
    )?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_locally_without_base_url() {
        let tool = EmployeeLookup::new(&EmployeeApiConfig::default());
        let mut args = Map::new();
        args.insert("name".to_string(), Value::String("Hardik".to_string()));
        let blocks = tool.invoke(&args).await.unwrap();
        assert_eq!(blocks[0].as_text(), Some("My name is Hardik"));
    }

    #[test]
    fn registry_contains_employee_tool() {
        let registry = demo_registry(&EmployeeApiConfig::default()).unwrap();
        let names: Vec<_> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["employee_lookup"]);
    }
}
