//! Phase documents: YAML text to validated [`MigrationPhase`].
//!
//! Column and rule entries accept a short form (`Name: text`) and a long form
//! (`Name: { type: text, value: "''", is_enum: false }`). A `create` table
//! entry is either a plain column map or `{ columns, condition, before }`.
//! A `delete` entry of `[]` (or no value) drops the whole table.

use super::guidelines::{
    ColumnDefinition, ColumnsDefinition, DataTransferDefinition, PhaseGuidelines, RuleUpdate,
    TableDelete, TableTransfer, TableUpdate, TransferColumn,
};
use super::MigrationPhase;
use crate::error::MigrationError;
use crate::version::Version;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::marker::PhantomData;

/// Turns a textual document into a validated phase.
pub trait PhaseSource: Send + Sync {
    /// Parse and validate one document. `source_name` labels errors.
    fn deserialize(&self, document: &str, source_name: &str)
        -> Result<MigrationPhase, MigrationError>;
}

/// The YAML phase source.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlPhaseSource;

impl PhaseSource for YamlPhaseSource {
    fn deserialize(
        &self,
        document: &str,
        source_name: &str,
    ) -> Result<MigrationPhase, MigrationError> {
        let raw: RawPhase =
            serde_yaml::from_str(document).map_err(|e| MigrationError::Format {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let invalid = |message: String| MigrationError::Validation {
            source_name: source_name.to_string(),
            message,
        };

        let version = raw
            .version
            .ok_or_else(|| invalid("missing 'version'".to_string()))?;
        let title = raw
            .title
            .ok_or_else(|| invalid(format!("phase {} is missing 'title'", version)))?;

        let phase = MigrationPhase {
            version,
            title,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            guidelines: raw.guidelines.unwrap_or_default().into_guidelines(),
        };
        phase.validate().map_err(invalid)?;
        Ok(phase)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPhase {
    #[serde(default)]
    version: Option<Version>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    guidelines: Option<RawGuidelines>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGuidelines {
    #[serde(default)]
    create: Option<Ordered<RawTable>>,
    #[serde(default)]
    update: Option<Ordered<Ordered<RawRule>>>,
    #[serde(default)]
    delete: Option<Ordered<Option<Vec<String>>>>,
    #[serde(default)]
    transfer: Option<Ordered<RawTransfer>>,
}

impl RawGuidelines {
    fn into_guidelines(self) -> PhaseGuidelines {
        let create = self
            .create
            .map(Ordered::into_entries)
            .unwrap_or_default()
            .into_iter()
            .map(|(table, raw)| raw.into_definition(table))
            .collect();

        let update = self
            .update
            .map(Ordered::into_entries)
            .unwrap_or_default()
            .into_iter()
            .map(|(table, rules)| TableUpdate {
                table,
                rules: rules
                    .into_entries()
                    .into_iter()
                    .map(|(column, raw)| raw.into_update(column))
                    .collect(),
            })
            .collect();

        let delete = self
            .delete
            .map(Ordered::into_entries)
            .unwrap_or_default()
            .into_iter()
            .map(|(table, columns)| TableDelete {
                table,
                columns: columns.unwrap_or_default(),
            })
            .collect();

        let transfer = self
            .transfer
            .map(Ordered::into_entries)
            .unwrap_or_default()
            .into_iter()
            .map(|(table, raw)| TableTransfer::new(table, raw.into_definition()))
            .collect();

        PhaseGuidelines {
            create,
            update,
            delete,
            transfer,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTable {
    Long(RawLongTable),
    Short(Ordered<RawColumn>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLongTable {
    columns: Ordered<RawColumn>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    before: Option<String>,
}

impl RawTable {
    fn into_definition(self, table: String) -> ColumnsDefinition {
        let (columns, condition, before) = match self {
            RawTable::Long(long) => (long.columns, long.condition, long.before),
            RawTable::Short(columns) => (columns, None, None),
        };
        ColumnsDefinition {
            table,
            columns: columns
                .into_entries()
                .into_iter()
                .map(|(name, raw)| raw.into_definition(name))
                .collect(),
            condition,
            before,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Short(String),
    Long(RawLongColumn),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLongColumn {
    #[serde(rename = "type")]
    column_type: String,
    #[serde(default, deserialize_with = "scalar_string")]
    value: Option<String>,
    #[serde(default)]
    is_enum: bool,
}

impl RawColumn {
    fn into_definition(self, name: String) -> ColumnDefinition {
        match self {
            RawColumn::Short(column_type) => ColumnDefinition::new(name, column_type),
            RawColumn::Long(long) => ColumnDefinition {
                name,
                column_type: long.column_type,
                value: long.value,
                is_enum: long.is_enum,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Short(String),
    Long(RawLongRule),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLongRule {
    #[serde(default, rename = "type")]
    column_type: Option<String>,
    #[serde(default)]
    current_type: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    value: Option<String>,
    #[serde(default)]
    is_enum: Option<bool>,
    #[serde(default)]
    is_sequence: Option<bool>,
    #[serde(default)]
    sequence_name: Option<String>,
    #[serde(default)]
    inherits: Option<String>,
}

impl RawRule {
    fn into_update(self, column: String) -> RuleUpdate {
        match self {
            RawRule::Short(column_type) => RuleUpdate::new(column).with_type(column_type),
            RawRule::Long(long) => RuleUpdate {
                column,
                column_type: long.column_type,
                current_type: long.current_type,
                value: long.value,
                is_enum: long.is_enum,
                is_sequence: long.is_sequence,
                sequence_name: long.sequence_name,
                inherits: long.inherits,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransfer {
    #[serde(default)]
    columns: Option<Ordered<ScalarString>>,
    #[serde(default)]
    script: Option<String>,
}

impl RawTransfer {
    fn into_definition(self) -> DataTransferDefinition {
        DataTransferDefinition {
            columns: self
                .columns
                .map(Ordered::into_entries)
                .unwrap_or_default()
                .into_iter()
                .map(|(target, source)| TransferColumn {
                    target,
                    source: source.0,
                })
                .collect(),
            script: self.script.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// A mapping deserialized in document order. Duplicate keys are rejected.
struct Ordered<V>(Vec<(String, V)>);

impl<V> Ordered<V> {
    fn into_entries(self) -> Vec<(String, V)> {
        self.0
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, V)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    if entries.iter().any(|(existing, _)| *existing == key) {
                        return Err(de::Error::custom(format!("duplicate key '{}'", key)));
                    }
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// A YAML scalar (string, number or bool) kept as its text.
struct ScalarString(String);

impl<'de> Deserialize<'de> for ScalarString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScalarVisitor;

        impl Visitor<'_> for ScalarVisitor {
            type Value = ScalarString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ScalarString, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ScalarString, E> {
                Ok(ScalarString(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ScalarString, E> {
                Ok(ScalarString(v.to_string()))
            }

            // `1.50` would come back as "1.5".
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ScalarString, E> {
                if v.fract() != 0.0 {
                    return Err(E::custom(format!(
                        "{} is a decimal number; quote it to keep its exact text",
                        v
                    )));
                }
                Ok(ScalarString(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<ScalarString, E> {
                Ok(ScalarString(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<ScalarString>::deserialize(deserializer)?.map(|s| s.0))
}
