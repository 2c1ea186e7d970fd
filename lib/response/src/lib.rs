use serde::Serialize;

/// The uniform response type of the dispatch enum. Each handler's
/// typed response converts into the JSON value the envelope is built
/// from; a failed serialization is carried instead of panicking.
pub enum JsonPayload {
  Ok(serde_json::Value),
  Err(serde_json::Error),
}

// JsonPayload itself is intentionally not Serialize, which keeps
// this conversion from overlapping the reflexive From impl.
impl<T: Serialize> From<T> for JsonPayload {
  fn from(value: T) -> JsonPayload {
    match serde_json::to_value(&value) {
      Ok(value) => JsonPayload::Ok(value),
      Err(e) => JsonPayload::Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Serialize)]
  struct Row {
    name: &'static str,
    count: u32,
  }

  #[test]
  fn captures_typed_responses_as_values() {
    let payload: JsonPayload =
      vec![Row { name: "web", count: 2 }].into();
    match payload {
      JsonPayload::Ok(value) => {
        assert_eq!(value[0]["name"], "web");
        assert_eq!(value[0]["count"], 2);
      }
      JsonPayload::Err(_) => panic!("expected Ok"),
    }
  }
}
