//! Structured tax documents built from document-extraction output.
//!
//! Extraction produces loosely typed `{document_type, fields, confidence}`
//! blobs. Each supported form gets its own field struct with every box
//! optional; unknown document types are rejected rather than passed through.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "w2")]
    W2,
    #[serde(rename = "1099_nec")]
    Form1099Nec,
    #[serde(rename = "1099_int")]
    Form1099Int,
    #[serde(rename = "1099_div")]
    Form1099Div,
    #[serde(rename = "1099_g")]
    Form1099G,
    #[serde(rename = "1098_t")]
    Form1098T,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::W2 => "w2",
            Self::Form1099Nec => "1099_nec",
            Self::Form1099Int => "1099_int",
            Self::Form1099Div => "1099_div",
            Self::Form1099G => "1099_g",
            Self::Form1098T => "1098_t",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "w2" | "w_2" => Ok(Self::W2),
            "1099_nec" => Ok(Self::Form1099Nec),
            "1099_int" => Ok(Self::Form1099Int),
            "1099_div" => Ok(Self::Form1099Div),
            "1099_g" => Ok(Self::Form1099G),
            "1098_t" => Ok(Self::Form1098T),
            _ => Err(EngineError::validation(format!(
                "unsupported document type '{raw}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct W2Fields {
    #[serde(default)]
    pub wages: Option<Money>,
    #[serde(default)]
    pub federal_withholding: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonemployeeCompensationFields {
    #[serde(default)]
    pub nonemployee_compensation: Option<Money>,
    #[serde(default)]
    pub federal_withholding: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestFields {
    #[serde(default)]
    pub interest_income: Option<Money>,
    #[serde(default)]
    pub tax_exempt_interest: Option<Money>,
    #[serde(default)]
    pub federal_withholding: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendFields {
    #[serde(default)]
    pub ordinary_dividends: Option<Money>,
    #[serde(default)]
    pub capital_gain_distributions: Option<Money>,
    #[serde(default)]
    pub federal_withholding: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernmentPaymentFields {
    #[serde(default)]
    pub unemployment_compensation: Option<Money>,
    #[serde(default)]
    pub federal_withholding: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionFields {
    #[serde(default)]
    pub payments_received: Option<Money>,
    #[serde(default)]
    pub scholarships_or_grants: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "document_type", content = "fields")]
pub enum TaxDocument {
    #[serde(rename = "w2")]
    W2(W2Fields),
    #[serde(rename = "1099_nec")]
    Form1099Nec(NonemployeeCompensationFields),
    #[serde(rename = "1099_int")]
    Form1099Int(InterestFields),
    #[serde(rename = "1099_div")]
    Form1099Div(DividendFields),
    #[serde(rename = "1099_g")]
    Form1099G(GovernmentPaymentFields),
    #[serde(rename = "1098_t")]
    Form1098T(TuitionFields),
}

fn amount(field: Option<Money>) -> Money {
    field.unwrap_or(Money::ZERO)
}

impl TaxDocument {
    pub const fn document_type(&self) -> DocumentType {
        match self {
            Self::W2(_) => DocumentType::W2,
            Self::Form1099Nec(_) => DocumentType::Form1099Nec,
            Self::Form1099Int(_) => DocumentType::Form1099Int,
            Self::Form1099Div(_) => DocumentType::Form1099Div,
            Self::Form1099G(_) => DocumentType::Form1099G,
            Self::Form1098T(_) => DocumentType::Form1098T,
        }
    }

    /// Income counted toward AGI.
    pub fn gross_income(&self) -> Result<Money, EngineError> {
        match self {
            Self::W2(fields) => Ok(amount(fields.wages)),
            Self::Form1099Nec(fields) => Ok(amount(fields.nonemployee_compensation)),
            Self::Form1099Int(fields) => Ok(amount(fields.interest_income)),
            Self::Form1099Div(fields) => amount(fields.ordinary_dividends)
                .checked_add(amount(fields.capital_gain_distributions)),
            Self::Form1099G(fields) => Ok(amount(fields.unemployment_compensation)),
            Self::Form1098T(_) => Ok(Money::ZERO),
        }
    }

    /// Wages and self-employment receipts, the base of the earned income credit.
    pub fn earned_income(&self) -> Money {
        match self {
            Self::W2(fields) => amount(fields.wages),
            Self::Form1099Nec(fields) => amount(fields.nonemployee_compensation),
            _ => Money::ZERO,
        }
    }

    /// Investment income measured against the earned income credit ceiling.
    pub fn investment_income(&self) -> Result<Money, EngineError> {
        match self {
            Self::Form1099Int(fields) => {
                amount(fields.interest_income).checked_add(amount(fields.tax_exempt_interest))
            }
            Self::Form1099Div(fields) => amount(fields.ordinary_dividends)
                .checked_add(amount(fields.capital_gain_distributions)),
            _ => Ok(Money::ZERO),
        }
    }

    pub fn federal_withholding(&self) -> Money {
        match self {
            Self::W2(fields) => amount(fields.federal_withholding),
            Self::Form1099Nec(fields) => amount(fields.federal_withholding),
            Self::Form1099Int(fields) => amount(fields.federal_withholding),
            Self::Form1099Div(fields) => amount(fields.federal_withholding),
            Self::Form1099G(fields) => amount(fields.federal_withholding),
            Self::Form1098T(_) => Money::ZERO,
        }
    }

    /// Tuition paid net of scholarships, floored at zero. `None` for other forms.
    pub fn qualified_education_expenses(&self) -> Option<Money> {
        match self {
            Self::Form1098T(fields) => Some(
                (amount(fields.payments_received) - amount(fields.scholarships_or_grants))
                    .floor_at_zero(),
            ),
            _ => None,
        }
    }
}

/// Extraction output exactly as the document pipeline hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub document_type: String,
    #[serde(default)]
    pub fields: Value,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExtraction")]
pub struct ExtractedDocument {
    #[serde(flatten)]
    pub document: TaxDocument,
    pub confidence: f32,
}

impl ExtractedDocument {
    pub fn is_low_confidence(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}

/// Read every box `T` declares as money before the typed parse, so a
/// sub-cent amount keeps its precision error and negative boxes are refused.
fn check_boxes<T: Serialize + Default>(
    document_type: DocumentType,
    fields: &Map<String, Value>,
) -> Result<(), EngineError> {
    let declared = serde_json::to_value(T::default()).map_err(|err| {
        EngineError::validation(format!("{document_type} box layout is unavailable: {err}"))
    })?;
    let Value::Object(boxes) = declared else {
        return Ok(());
    };

    for name in boxes.keys() {
        let value = match fields.get(name) {
            Some(Value::String(raw)) => Money::parse(raw)?,
            Some(Value::Number(number)) => Money::parse(&number.to_string())?,
            _ => continue,
        };
        if value.is_negative() {
            return Err(EngineError::validation(format!(
                "{document_type} box {name} cannot be negative (got {value})"
            )));
        }
    }
    Ok(())
}

fn fields_as<T: DeserializeOwned + Serialize + Default>(
    document_type: DocumentType,
    fields: Value,
) -> Result<T, EngineError> {
    match fields {
        Value::Null => Ok(T::default()),
        Value::Object(ref boxes) => {
            check_boxes::<T>(document_type, boxes)?;
            serde_json::from_value(fields).map_err(|err| {
                EngineError::validation(format!("{document_type} fields are malformed: {err}"))
            })
        }
        other => Err(EngineError::validation(format!(
            "{document_type} fields must be an object, got {other}"
        ))),
    }
}

impl TryFrom<RawExtraction> for ExtractedDocument {
    type Error = EngineError;

    fn try_from(raw: RawExtraction) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&raw.confidence) {
            return Err(EngineError::validation(format!(
                "extraction confidence {} is outside 0..=1",
                raw.confidence
            )));
        }

        let document_type: DocumentType = raw.document_type.parse()?;
        let fields = raw.fields;
        let document = match document_type {
            DocumentType::W2 => TaxDocument::W2(fields_as(document_type, fields)?),
            DocumentType::Form1099Nec => {
                TaxDocument::Form1099Nec(fields_as(document_type, fields)?)
            }
            DocumentType::Form1099Int => {
                TaxDocument::Form1099Int(fields_as(document_type, fields)?)
            }
            DocumentType::Form1099Div => {
                TaxDocument::Form1099Div(fields_as(document_type, fields)?)
            }
            DocumentType::Form1099G => TaxDocument::Form1099G(fields_as(document_type, fields)?),
            DocumentType::Form1098T => TaxDocument::Form1098T(fields_as(document_type, fields)?),
        };

        Ok(Self {
            document,
            confidence: raw.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_typed_document_from_extraction() {
        let raw: RawExtraction = serde_json::from_value(json!({
            "document_type": "W-2",
            "fields": { "wages": "41,250.00", "federal_withholding": 3100, "box_12": "DD" },
            "confidence": 0.97
        }))
        .expect("raw extraction parses");

        let document = ExtractedDocument::try_from(raw).expect("w2 converts");
        assert_eq!(document.document.document_type(), DocumentType::W2);
        assert_eq!(
            document.document.gross_income().expect("representable"),
            Money::from_dollars(41_250)
        );
        assert_eq!(
            document.document.federal_withholding(),
            Money::from_dollars(3_100)
        );
    }

    #[test]
    fn rejects_unknown_document_types() {
        let raw = RawExtraction {
            document_type: "1040".to_string(),
            fields: json!({}),
            confidence: 0.9,
        };
        assert!(matches!(
            ExtractedDocument::try_from(raw),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn deserializing_a_document_goes_through_validation() {
        let parsed: Result<ExtractedDocument, _> = serde_json::from_value(json!({
            "document_type": "1099_misc",
            "fields": {},
            "confidence": 0.9
        }));
        assert!(parsed.is_err());

        let parsed: ExtractedDocument = serde_json::from_value(json!({
            "document_type": "1098_t",
            "fields": { "payments_received": "4200", "scholarships_or_grants": "5000" },
            "confidence": 0.5
        }))
        .expect("1098-t parses");
        assert_eq!(
            parsed.document.qualified_education_expenses(),
            Some(Money::ZERO)
        );
        assert!(parsed.is_low_confidence(0.8));
    }

    #[test]
    fn missing_boxes_count_as_zero() {
        let document = ExtractedDocument::try_from(RawExtraction {
            document_type: "1099_div".to_string(),
            fields: Value::Null,
            confidence: 1.0,
        })
        .expect("empty fields are allowed");
        assert_eq!(document.document.gross_income().expect("sums"), Money::ZERO);
        assert_eq!(
            document.document.investment_income().expect("sums"),
            Money::ZERO
        );
    }

    #[test]
    fn sub_cent_amounts_are_precision_errors() {
        for fields in [json!({ "interest_income": "12.345" }), json!({ "interest_income": 0.125 })] {
            let raw = RawExtraction {
                document_type: "1099_int".to_string(),
                fields,
                confidence: 0.99,
            };
            match ExtractedDocument::try_from(raw) {
                Err(EngineError::Precision(message)) => assert!(message.contains("sub-cent")),
                other => panic!("expected precision error, got {other:?}"),
            }
        }

        let w2 = RawExtraction {
            document_type: "w2".to_string(),
            fields: json!({ "wages": "12.345" }),
            confidence: 0.99,
        };
        assert!(matches!(
            ExtractedDocument::try_from(w2),
            Err(EngineError::Precision(_))
        ));
    }

    #[test]
    fn malformed_and_negative_boxes_are_validation_errors() {
        for fields in [
            json!({ "wages": "twelve" }),
            json!({ "wages": "-500.00" }),
            json!({ "wages": true }),
        ] {
            let raw = RawExtraction {
                document_type: "w2".to_string(),
                fields,
                confidence: 0.99,
            };
            assert!(matches!(
                ExtractedDocument::try_from(raw),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn box_sums_that_overflow_are_precision_errors() {
        let document = TaxDocument::Form1099Div(DividendFields {
            ordinary_dividends: Some(Money::from_cents(i64::MAX - 1)),
            capital_gain_distributions: Some(Money::from_cents(2)),
            federal_withholding: None,
        });
        assert!(matches!(
            document.gross_income(),
            Err(EngineError::Precision(_))
        ));
    }

    #[test]
    fn serialized_form_reads_back() {
        let document = ExtractedDocument {
            document: TaxDocument::Form1099G(GovernmentPaymentFields {
                unemployment_compensation: Some(Money::from_dollars(4_800)),
                federal_withholding: Some(Money::from_dollars(480)),
            }),
            confidence: 0.91,
        };
        let json = serde_json::to_value(&document).expect("serializes");
        assert_eq!(json["document_type"], "1099_g");
        assert_eq!(json["fields"]["unemployment_compensation"], "4800.00");

        let back: ExtractedDocument = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back, document);
    }
}
