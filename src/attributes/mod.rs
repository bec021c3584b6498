//! Request-scoped attributes and their binding into stages.
//!
//! Every stage declares the attributes it reads and writes as [`AttributeSpec`]s,
//! one per key, phase and direction. The declarations are validated once when the
//! pipeline is assembled. At each lifecycle boundary the pipeline hands the stage a
//! [`Binder`] for that phase and direction. The stage copies declared inputs out of
//! the shared [`AttributeMap`] into its own typed fields, or writes its outputs back.
//! Missing required inputs, type mismatches and undeclared keys fail the request
//! with [`LingoError::Binding`].

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LingoError, LingoResult};

/// Lifecycle phase an attribute is bound in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingPhase {
    /// Around `init`.
    Init,
    /// Inputs before `before_processing`, outputs after `after_processing`.
    Processing,
}

/// Whether an attribute flows into the stage or out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingDirection {
    Input,
    Output,
}

/// Declaration of one attribute a stage binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub key: &'static str,
    pub phase: BindingPhase,
    pub direction: BindingDirection,
    /// Inputs: must be present in the map. Outputs: the stage must write it.
    pub required: bool,
}

impl AttributeSpec {
    pub const fn new(key: &'static str, phase: BindingPhase, direction: BindingDirection) -> Self {
        Self {
            key,
            phase,
            direction,
            required: false,
        }
    }

    pub const fn init_input(key: &'static str) -> Self {
        Self::new(key, BindingPhase::Init, BindingDirection::Input)
    }

    pub const fn init_output(key: &'static str) -> Self {
        Self::new(key, BindingPhase::Init, BindingDirection::Output)
    }

    pub const fn processing_input(key: &'static str) -> Self {
        Self::new(key, BindingPhase::Processing, BindingDirection::Input)
    }

    pub const fn processing_output(key: &'static str) -> Self {
        Self::new(key, BindingPhase::Processing, BindingDirection::Output)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Checks a stage's declarations: non-empty keys, no key declared twice for the
/// same phase and direction.
pub fn validate_specs(stage: &str, specs: &[AttributeSpec]) -> LingoResult<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        if spec.key.is_empty() {
            return Err(LingoError::binding(stage, "", "attribute key must not be empty"));
        }
        if !seen.insert((spec.key, spec.phase, spec.direction)) {
            return Err(LingoError::binding(
                stage,
                spec.key,
                format!(
                    "declared twice for {:?} {:?}",
                    spec.phase, spec.direction
                ),
            ));
        }
    }
    Ok(())
}

/// String-keyed attribute store shared by all stages of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    values: BTreeMap<String, serde_json::Value>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a raw JSON value.
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn insert<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> LingoResult<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Typed read. `Ok(None)` when absent or null.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> LingoResult<Option<T>> {
        match self.values.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(T::deserialize(value)?)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Binding session for one stage, phase and direction.
pub struct Binder<'a> {
    stage: &'a str,
    specs: &'a [AttributeSpec],
    attributes: &'a mut AttributeMap,
    phase: BindingPhase,
    direction: BindingDirection,
    written: Vec<&'static str>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        stage: &'a str,
        specs: &'a [AttributeSpec],
        attributes: &'a mut AttributeMap,
        phase: BindingPhase,
        direction: BindingDirection,
    ) -> Self {
        Self {
            stage,
            specs,
            attributes,
            phase,
            direction,
            written: Vec::new(),
        }
    }

    pub fn phase(&self) -> BindingPhase {
        self.phase
    }

    pub fn direction(&self) -> BindingDirection {
        self.direction
    }

    /// True when this session binds `phase` attributes in `direction`.
    pub fn is(&self, phase: BindingPhase, direction: BindingDirection) -> bool {
        self.phase == phase && self.direction == direction
    }

    /// Reads a declared input. `Ok(None)` if an optional input is absent.
    pub fn input<T: DeserializeOwned>(&self, key: &str) -> LingoResult<Option<T>> {
        let spec = self.spec(key, BindingDirection::Input)?;
        match self.attributes.get_value(key) {
            None | Some(serde_json::Value::Null) => {
                if spec.required {
                    Err(LingoError::binding(
                        self.stage,
                        key,
                        "required attribute is missing",
                    ))
                } else {
                    Ok(None)
                }
            }
            Some(value) => T::deserialize(value).map(Some).map_err(|e| {
                LingoError::binding(self.stage, key, format!("type mismatch: {e}"))
            }),
        }
    }

    /// Reads a declared input into `field`, leaving it untouched when absent.
    pub fn input_into<T: DeserializeOwned>(&self, key: &str, field: &mut T) -> LingoResult<()> {
        if let Some(value) = self.input(key)? {
            *field = value;
        }
        Ok(())
    }

    /// Writes a declared output into the shared map.
    pub fn output<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> LingoResult<()> {
        let spec_key = self.spec(key, BindingDirection::Output)?.key;
        let value = serde_json::to_value(value).map_err(|e| {
            LingoError::binding(self.stage, key, format!("cannot serialize output: {e}"))
        })?;
        self.attributes.insert_value(spec_key, value);
        self.written.push(spec_key);
        Ok(())
    }

    /// Fails if a required output of this phase was not written.
    pub(crate) fn finish(self) -> LingoResult<()> {
        if self.direction != BindingDirection::Output {
            return Ok(());
        }
        for spec in self.specs {
            if spec.required
                && spec.phase == self.phase
                && spec.direction == BindingDirection::Output
                && !self.written.contains(&spec.key)
            {
                return Err(LingoError::binding(
                    self.stage,
                    spec.key,
                    "required output was not produced",
                ));
            }
        }
        Ok(())
    }

    fn spec(&self, key: &str, direction: BindingDirection) -> LingoResult<&'a AttributeSpec> {
        if self.direction != direction {
            return Err(LingoError::binding(
                self.stage,
                key,
                format!("cannot bind {direction:?} during {:?} binding", self.direction),
            ));
        }
        self.specs
            .iter()
            .find(|s| s.key == key && s.phase == self.phase && s.direction == direction)
            .ok_or_else(|| {
                LingoError::binding(
                    self.stage,
                    key,
                    format!("not declared for {:?} {direction:?}", self.phase),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[AttributeSpec] = &[
        AttributeSpec::init_input("pool.size"),
        AttributeSpec::processing_input("documents").required(),
        AttributeSpec::processing_output("clusters").required(),
        AttributeSpec::processing_output("stats"),
    ];

    #[test]
    fn attribute_map_typed_access() {
        let mut map = AttributeMap::new();
        map.insert("count", &3usize).unwrap();
        assert_eq!(map.get::<usize>("count").unwrap(), Some(3));
        assert_eq!(map.get::<usize>("missing").unwrap(), None);
        assert!(map.get::<String>("count").is_err());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn null_counts_as_absent() {
        let map = AttributeMap::new().with("x", serde_json::Value::Null);
        assert_eq!(map.get::<u32>("x").unwrap(), None);
    }

    #[test]
    fn binder_reads_declared_input() {
        let mut map = AttributeMap::new().with("pool.size", json!(64));
        let binder = Binder::new(
            "tokenizer",
            SPECS,
            &mut map,
            BindingPhase::Init,
            BindingDirection::Input,
        );
        let mut size = 500usize;
        binder.input_into("pool.size", &mut size).unwrap();
        assert_eq!(size, 64);
    }

    #[test]
    fn binder_keeps_default_for_missing_optional() {
        let mut map = AttributeMap::new();
        let binder = Binder::new(
            "tokenizer",
            SPECS,
            &mut map,
            BindingPhase::Init,
            BindingDirection::Input,
        );
        let mut size = 500usize;
        binder.input_into("pool.size", &mut size).unwrap();
        assert_eq!(size, 500);
    }

    #[test]
    fn missing_required_input_fails() {
        let mut map = AttributeMap::new();
        let binder = Binder::new(
            "source",
            SPECS,
            &mut map,
            BindingPhase::Processing,
            BindingDirection::Input,
        );
        let err = binder.input::<Vec<String>>("documents").unwrap_err();
        assert!(matches!(err, LingoError::Binding { ref key, .. } if key == "documents"));
    }

    #[test]
    fn type_mismatch_fails() {
        let mut map = AttributeMap::new().with("pool.size", json!("large"));
        let binder = Binder::new(
            "tokenizer",
            SPECS,
            &mut map,
            BindingPhase::Init,
            BindingDirection::Input,
        );
        let err = binder.input::<usize>("pool.size").unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
    }

    #[test]
    fn undeclared_key_fails() {
        let mut map = AttributeMap::new().with("other", json!(1));
        let binder = Binder::new(
            "tokenizer",
            SPECS,
            &mut map,
            BindingPhase::Init,
            BindingDirection::Input,
        );
        assert!(binder.input::<u32>("other").is_err());
        // declared, but for another phase
        assert!(binder.input::<Vec<String>>("documents").is_err());
    }

    #[test]
    fn outputs_are_written_and_required_ones_enforced() {
        let mut map = AttributeMap::new();
        {
            let mut binder = Binder::new(
                "lingo",
                SPECS,
                &mut map,
                BindingPhase::Processing,
                BindingDirection::Output,
            );
            binder.output("stats", &json!({"n": 1})).unwrap();
            assert!(binder.finish().is_err());
        }
        let mut binder = Binder::new(
            "lingo",
            SPECS,
            &mut map,
            BindingPhase::Processing,
            BindingDirection::Output,
        );
        binder.output("clusters", &Vec::<String>::new()).unwrap();
        binder.finish().unwrap();
        assert!(map.contains("clusters"));
        assert!(map.contains("stats"));
    }

    #[test]
    fn output_rejected_during_input_binding() {
        let mut map = AttributeMap::new();
        let mut binder = Binder::new(
            "lingo",
            SPECS,
            &mut map,
            BindingPhase::Processing,
            BindingDirection::Input,
        );
        assert!(binder.output("clusters", &1).is_err());
    }

    #[test]
    fn validate_specs_rejects_duplicates() {
        assert!(validate_specs("ok", SPECS).is_ok());
        let dup = [
            AttributeSpec::processing_input("a"),
            AttributeSpec::processing_input("a").required(),
        ];
        assert!(validate_specs("dup", &dup).is_err());
        let same_key_other_phase = [
            AttributeSpec::init_input("a"),
            AttributeSpec::processing_input("a"),
        ];
        assert!(validate_specs("ok", &same_key_other_phase).is_ok());
        assert!(validate_specs("empty", &[AttributeSpec::init_input("")]).is_err());
    }
}
