//! Default-value records: lookup lists (formula units, test groups, method groups) served by the
//! `/default-value` endpoint.

// std
use std::str::FromStr;
// self
use crate::{_prelude::*, flows::LabClient, http::ApiRequest};

/// Lookup list a default value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefaultValueType {
	/// Units used by formulas.
	FormulaUnit,
	/// Test groupings.
	TestGroup,
	/// Method groupings.
	MethodGroup,
}
impl DefaultValueType {
	/// Every list, in display order.
	pub const ALL: [Self; 3] = [Self::FormulaUnit, Self::TestGroup, Self::MethodGroup];

	/// Returns the wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::FormulaUnit => "FormulaUnit",
			Self::TestGroup => "TestGroup",
			Self::MethodGroup => "MethodGroup",
		}
	}
}
impl Display for DefaultValueType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for DefaultValueType {
	type Err = UnknownDefaultValueType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == s)
			.ok_or_else(|| UnknownDefaultValueType { value: s.to_owned() })
	}
}

/// Error returned when parsing an unknown [`DefaultValueType`] name.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown default value type: {value}.")]
pub struct UnknownDefaultValueType {
	/// Rejected input.
	pub value: String,
}

/// A stored default value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultValue {
	/// Server-assigned identifier; numeric identifiers are kept in their decimal form.
	#[serde(deserialize_with = "id_from_string_or_number")]
	pub id: String,
	/// Display value.
	pub value: String,
	/// Owning list.
	#[serde(rename = "type")]
	pub kind: DefaultValueType,
	/// Creation timestamp as reported by the server.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<String>,
}

/// Payload for creating a default value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDefaultValue {
	/// Display value.
	pub value: String,
	/// Owning list.
	#[serde(rename = "type")]
	pub kind: DefaultValueType,
}
impl NewDefaultValue {
	/// Creates a payload for `kind`.
	pub fn new(kind: DefaultValueType, value: impl Into<String>) -> Self {
		Self { value: value.into(), kind }
	}
}

/// Response envelope used by the records API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
	/// Application-level status code; `200` on success.
	#[serde(default)]
	pub resp_code: Option<i64>,
	/// Application-level status text.
	#[serde(default)]
	pub resp_text: Option<String>,
	/// Payload.
	#[serde(default = "Option::default")]
	pub data: Option<T>,
}
impl<T> ApiEnvelope<T> {
	/// Application-level success code.
	pub const OK: i64 = 200;

	/// Returns `true` when `respCode` reports success.
	pub fn is_ok(&self) -> bool {
		self.resp_code == Some(Self::OK)
	}
}

/// Page of list results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemPage<T> {
	/// Items on this page.
	#[serde(default = "Option::default")]
	pub items: Option<Vec<T>>,
	/// Total number of matching items, when reported.
	#[serde(default)]
	pub total: Option<u64>,
}

impl LabClient {
	/// Lists the default values of `kind`.
	///
	/// An envelope without a success code or without items yields an empty list.
	pub async fn default_values(&self, kind: DefaultValueType) -> Result<Vec<DefaultValue>> {
		let request =
			ApiRequest::get(&self.config().endpoints.default_values).query("type", kind.as_str());
		let envelope: ApiEnvelope<ItemPage<DefaultValue>> = self.send_json(request).await?;

		if !envelope.is_ok() {
			tracing::debug!(
				%kind,
				resp_code = ?envelope.resp_code,
				resp_text = ?envelope.resp_text,
				"Default value listing reported no data."
			);

			return Ok(Vec::new());
		}

		Ok(envelope.data.and_then(|page| page.items).unwrap_or_default())
	}

	/// Creates a default value and returns the server's envelope.
	pub async fn add_default_value(
		&self,
		value: &NewDefaultValue,
	) -> Result<ApiEnvelope<serde_json::Value>> {
		let request = ApiRequest::post(&self.config().endpoints.default_values).json(value)?;

		self.send_json(request).await
	}
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawId {
		Text(String),
		Number(i64),
	}

	Ok(match RawId::deserialize(deserializer)? {
		RawId::Text(text) => text,
		RawId::Number(number) => number.to_string(),
	})
}
