//! Request dispatch. The closed catalog is one tagged enum; the
//! dispatcher injects the composite `action:subaction` key and lets
//! the tag index the variant table, so dispatch cost never depends
//! on catalog size.

use armada_client::{
  api::{compose::*, container::*, docker::*, host::*, image::*, scout::*},
  entities::{ResponseEnvelope, ResponseFormat},
  error::{Error, ErrorKind},
};
use derive_variants::{EnumVariants, ExtractVariant};
use resolver_api::Resolve;
use response::JsonPayload;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

mod compose;
mod container;
mod docker;
mod host;
mod image;
mod scout;

#[derive(Debug)]
pub struct Args {
  /// Unique for every dispatched request.
  pub id: Uuid,
}

#[derive(
  Serialize, Deserialize, Debug, Clone, Resolve, EnumVariants,
)]
#[args(Args)]
#[response(JsonPayload)]
#[error(Error)]
#[variant_derive(Debug)]
#[serde(tag = "type", content = "params")]
#[allow(clippy::enum_variant_names, clippy::large_enum_variant)]
pub enum ApiRequest {
  // Container
  ContainerList(ContainerList),
  ContainerStart(ContainerStart),
  ContainerStop(ContainerStop),
  ContainerRestart(ContainerRestart),
  ContainerPause(ContainerPause),
  #[serde(alias = "ContainerResume")]
  ContainerUnpause(ContainerUnpause),
  ContainerLogs(ContainerLogs),
  ContainerStats(ContainerStats),
  ContainerInspect(ContainerInspect),
  ContainerSearch(ContainerSearch),
  ContainerPull(ContainerPull),
  ContainerRecreate(ContainerRecreate),
  ContainerExec(ContainerExec),
  ContainerTop(ContainerTop),

  // Compose
  ComposeList(ComposeList),
  ComposeStatus(ComposeStatus),
  ComposeUp(ComposeUp),
  ComposeDown(ComposeDown),
  ComposeRestart(ComposeRestart),
  ComposeLogs(ComposeLogs),
  ComposeBuild(ComposeBuild),
  ComposePull(ComposePull),
  ComposeRecreate(ComposeRecreate),
  ComposeRefresh(ComposeRefresh),

  // Docker
  DockerInfo(DockerInfo),
  DockerDf(DockerDf),
  DockerPrune(DockerPrune),
  DockerImages(DockerImages),
  DockerPull(DockerPull),
  DockerBuild(DockerBuild),
  DockerRmi(DockerRmi),
  DockerNetworks(DockerNetworks),
  DockerVolumes(DockerVolumes),

  // Host
  HostStatus(HostStatusRequest),
  HostResources(HostResourcesRequest),
  HostInfo(HostInfoRequest),
  HostUptime(HostUptimeRequest),
  HostServices(HostServicesRequest),
  HostNetwork(HostNetworkRequest),
  HostMounts(HostMountsRequest),
  HostPorts(HostPortsRequest),
  HostDoctor(HostDoctor),

  // Image
  ImageList(ImageList),
  ImagePull(ImagePull),
  ImageBuild(ImageBuild),
  ImageRemove(ImageRemove),

  // Scout
  ScoutRead(ScoutRead),
  ScoutList(ScoutList),
  ScoutTree(ScoutTree),
  ScoutExec(ScoutExec),
  ScoutFind(ScoutFind),
  ScoutTransfer(ScoutTransfer),
  ScoutDiff(ScoutDiff),
  ScoutNodes(ScoutNodes),
  ScoutPeek(ScoutPeek),
  ScoutDelta(ScoutDelta),
  ScoutEmit(ScoutEmit),
  ScoutBeam(ScoutBeam),
  ScoutPs(ScoutPs),
  ScoutDf(ScoutDfRequest),
  ScoutZfsPools(ScoutZfsPools),
  ScoutZfsDatasets(ScoutZfsDatasets),
  ScoutZfsSnapshots(ScoutZfsSnapshots),
  ScoutLogsSyslog(ScoutLogsSyslog),
  ScoutLogsJournal(ScoutLogsJournal),
  ScoutLogsDmesg(ScoutLogsDmesg),
  ScoutLogsAuth(ScoutLogsAuth),
}

#[derive(Deserialize, Debug)]
struct RequestEnvelope {
  action: String,
  subaction: String,
  #[serde(default, alias = "responseFormat")]
  response_format: ResponseFormat,
  #[serde(default, alias = "timeoutMs")]
  timeout_ms: Option<u64>,
  #[serde(flatten)]
  params: serde_json::Map<String, serde_json::Value>,
}

/// Variant tag of an `(action, subaction)` pair:
/// `container:list → ContainerList`,
/// `scout:zfs.pools → ScoutZfsPools`.
fn variant_key(action: &str, subaction: &str) -> String {
  let mut key = String::new();
  for part in
    std::iter::once(action).chain(subaction.split('.'))
  {
    let mut chars = part.chars();
    if let Some(first) = chars.next() {
      key.extend(first.to_uppercase());
      key.push_str(chars.as_str());
    }
  }
  key
}

/// Entry point of the request pipeline: one parsed request value
/// in, one envelope out. Everything is normalized here; no other
/// error shape escapes.
pub async fn dispatch(
  request: serde_json::Value,
) -> ResponseEnvelope {
  let envelope: RequestEnvelope =
    match serde_json::from_value(request) {
      Ok(envelope) => envelope,
      Err(e) => {
        return ResponseEnvelope::error(
          ErrorKind::InvalidInput,
          format!("invalid request envelope: {e}"),
        );
      }
    };

  if let Err(e) =
    crate::helpers::validate_timeout_ms(envelope.timeout_ms)
  {
    return envelope_error(e);
  }

  let key = variant_key(&envelope.action, &envelope.subaction);
  let request: ApiRequest = match serde_json::from_value(json!({
    "type": key,
    "params": serde_json::Value::Object(envelope.params),
  })) {
    Ok(request) => request,
    Err(e) => {
      let message = if e.to_string().contains("unknown variant") {
        format!(
          "unknown action/subaction '{}:{}'",
          envelope.action, envelope.subaction
        )
      } else {
        format!(
          "invalid request for '{}:{}': {e}",
          envelope.action, envelope.subaction
        )
      };
      return ResponseEnvelope::error(
        ErrorKind::InvalidInput,
        message,
      );
    }
  };

  let id = Uuid::new_v4();
  debug!(
    "request {id} | {:?} | format {:?}",
    request.extract_variant(),
    envelope.response_format
  );

  let args = Args { id };
  let resolve = request.resolve(&args);
  let result = match envelope.timeout_ms {
    Some(ms) => {
      match tokio::time::timeout(
        std::time::Duration::from_millis(ms),
        resolve,
      )
      .await
      {
        Ok(result) => result,
        Err(_elapsed) => {
          warn!("request {id} hit its {ms}ms deadline");
          return ResponseEnvelope::error(
            ErrorKind::Timeout,
            format!("request exceeded the {ms}ms deadline"),
          );
        }
      }
    }
    None => resolve.await,
  };

  match result {
    Ok(JsonPayload::Ok(value)) => ResponseEnvelope::Success {
      text: formatting::text_from_value(&value),
      structured: (envelope.response_format
        == ResponseFormat::Structured)
        .then_some(value),
    },
    Ok(JsonPayload::Err(e)) => ResponseEnvelope::error(
      ErrorKind::RemoteFailure,
      format!("failed to serialize response: {e}"),
    ),
    Err(e) => {
      warn!("request {id} failed | {e}");
      envelope_error(e)
    }
  }
}

fn envelope_error(e: Error) -> ResponseEnvelope {
  ResponseEnvelope::Error {
    message: e.message(),
    kind: e.kind,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn error_kind(envelope: &ResponseEnvelope) -> Option<ErrorKind> {
    match envelope {
      ResponseEnvelope::Error { kind, .. } => Some(*kind),
      ResponseEnvelope::Success { .. } => None,
    }
  }

  #[test]
  fn variant_keys() {
    assert_eq!(variant_key("container", "list"), "ContainerList");
    assert_eq!(variant_key("scout", "zfs.pools"), "ScoutZfsPools");
    assert_eq!(
      variant_key("scout", "logs.journal"),
      "ScoutLogsJournal"
    );
    assert_eq!(variant_key("docker", "prune"), "DockerPrune");
  }

  #[test]
  fn resume_is_an_alias_for_unpause() {
    let request: ApiRequest = serde_json::from_value(json!({
      "type": "ContainerResume",
      "params": { "container": "web" },
    }))
    .unwrap();
    assert!(matches!(request, ApiRequest::ContainerUnpause(_)));
  }

  #[tokio::test]
  async fn unknown_subaction_is_invalid_input() {
    let res = dispatch(json!({
      "action": "container",
      "subaction": "fly",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
    let ResponseEnvelope::Error { message, .. } = res else {
      unreachable!();
    };
    assert!(message.contains("container:fly"));
  }

  #[tokio::test]
  async fn missing_required_field_is_invalid_input() {
    let res = dispatch(json!({
      "action": "container",
      "subaction": "exec",
      // no container / command
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
  }

  #[tokio::test]
  async fn prune_without_force_is_rejected_without_side_effects() {
    let res = dispatch(json!({
      "action": "docker",
      "subaction": "prune",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
    let ResponseEnvelope::Error { message, .. } = res else {
      unreachable!();
    };
    assert!(message.contains("force"));
  }

  #[tokio::test]
  async fn command_injection_is_blocked_before_any_engine_call() {
    let res = dispatch(json!({
      "action": "container",
      "subaction": "exec",
      "container_id": "web",
      "command": "ls; rm -rf /",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
    let ResponseEnvelope::Error { message, .. } = res else {
      unreachable!();
    };
    assert!(message.contains("disallowed character"));
  }

  #[tokio::test]
  async fn limit_bounds_are_enforced() {
    for limit in [0, 101, -3] {
      let res = dispatch(json!({
        "action": "container",
        "subaction": "list",
        "limit": limit,
      }))
      .await;
      assert_eq!(
        error_kind(&res),
        Some(ErrorKind::InvalidInput),
        "limit {limit} must be rejected"
      );
    }
  }

  #[tokio::test]
  async fn log_line_bounds_are_enforced() {
    let res = dispatch(json!({
      "action": "container",
      "subaction": "logs",
      "container": "web",
      "lines": 501,
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
  }

  #[tokio::test]
  async fn traversal_paths_are_rejected() {
    let res = dispatch(json!({
      "action": "scout",
      "subaction": "read",
      "host": "tower",
      "path": "/etc/../root/secret",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
  }

  #[tokio::test]
  async fn oversized_timeout_is_rejected() {
    let res = dispatch(json!({
      "action": "host",
      "subaction": "status",
      "timeout_ms": 300_001,
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
  }

  #[tokio::test]
  async fn bad_response_format_is_rejected() {
    let res = dispatch(json!({
      "action": "host",
      "subaction": "status",
      "responseFormat": "yaml",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::InvalidInput));
  }

  #[tokio::test]
  async fn compose_up_with_no_owning_host_is_not_found() {
    // The test registry is empty, so discovery has nowhere to look.
    let res = dispatch(json!({
      "action": "compose",
      "subaction": "up",
      "project": "plex",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::NotFound));
  }

  #[tokio::test]
  async fn empty_fleet_listing_succeeds_with_structured_payload() {
    let res = dispatch(json!({
      "action": "container",
      "subaction": "list",
      "responseFormat": "structured",
    }))
    .await;
    let ResponseEnvelope::Success { structured, .. } = res else {
      panic!("expected success, got {res:?}");
    };
    assert_eq!(structured, Some(json!([])));
  }

  #[tokio::test]
  async fn unregistered_host_is_not_found() {
    let res = dispatch(json!({
      "action": "scout",
      "subaction": "peek",
      "host": "ghost",
      "path": "/etc/hostname",
    }))
    .await;
    assert_eq!(error_kind(&res), Some(ErrorKind::NotFound));
  }
}
