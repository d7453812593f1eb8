//! `query`: run a raw GraphQL document and print the response.

use serde_json::Value;
use towersync_api::Request;
use towersync_core::{ConnectionConfig, CoreError};

use crate::cli::{GlobalOpts, QueryArgs};
use crate::error::CliError;
use crate::output::Printer;

use super::util;

/// Parse `--variables` into the request.
fn build_request(args: QueryArgs) -> Result<Request, CliError> {
    let mut request = Request::new(args.query);
    let Some(raw) = args.variables else {
        return Ok(request);
    };

    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(vars) => {
            request.variables.extend(vars);
            Ok(request)
        }
        other => Err(CliError::Validation {
            field: "variables".into(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

pub async fn handle(
    config: &ConnectionConfig,
    args: QueryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = build_request(args)?;
    let client = util::connect(config).await?;

    let resp = client
        .query(&request)
        .await
        .map_err(|e| CoreError::from_api(e, client.endpoint()))?;

    Printer::stdout(global).document(&resp)?;

    if resp.is_ok() {
        Ok(())
    } else {
        Err(CoreError::from_response(&resp).into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(variables: Option<&str>) -> QueryArgs {
        QueryArgs {
            query: "query($id: ID!) { vm(where: {id: $id}) { name } }".into(),
            variables: variables.map(str::to_owned),
        }
    }

    #[test]
    fn variables_are_bound() {
        let request = build_request(args(Some(r#"{"id": "vm-1"}"#))).unwrap();
        assert_eq!(request.variables.get("id"), Some(&json!("vm-1")));
    }

    #[test]
    fn non_object_variables_are_rejected() {
        assert!(matches!(
            build_request(args(Some("[1, 2]"))),
            Err(CliError::Validation { field, .. }) if field == "variables"
        ));
        assert!(matches!(build_request(args(Some("{"))), Err(CliError::Json(_))));
    }

    #[test]
    fn no_variables_is_fine() {
        assert!(build_request(args(None)).unwrap().variables.is_empty());
    }
}
