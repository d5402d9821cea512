use chrono::{
  DateTime,
  NaiveDateTime,
  Utc
};

/// Parses an API timestamp. Values
/// without an offset are taken as UTC.
pub fn parse_api_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(dt.with_timezone(&Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        trimmed, fmt
      )
    {
      return Some(
        DateTime::<Utc>::from_naive_utc_and_offset(
          ndt, Utc
        )
      );
    }
  }

  None
}

pub mod api_timestamp {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::AutoSi,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_api_timestamp(&raw)
      .ok_or_else(|| {
        serde::de::Error::custom(
          format!(
            "invalid timestamp: {raw}"
          )
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::parse_api_timestamp;

  #[test]
  fn naive_iso_is_read_as_utc() {
    let parsed = parse_api_timestamp(
      "2024-05-06T07:08:09.250000"
    )
    .expect("naive iso should parse");
    assert_eq!(
      parsed
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string(),
      "2024-05-06T07:08:09"
    );
  }

  #[test]
  fn offsets_are_normalized_to_utc() {
    let parsed = parse_api_timestamp(
      "2024-05-06T09:00:00+02:00"
    )
    .expect("rfc3339 should parse");
    let expected = Utc
      .with_ymd_and_hms(
        2024, 5, 6, 7, 0, 0
      )
      .single()
      .expect("valid date");
    assert_eq!(parsed, expected);
  }

  #[test]
  fn garbage_is_rejected() {
    assert!(
      parse_api_timestamp("yesterday")
        .is_none()
    );
    assert!(
      parse_api_timestamp("  ").is_none()
    );
  }
}
