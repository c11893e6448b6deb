use std::{
    collections::HashMap,
    error::Error,
    fmt,
    ops::Index,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use chrono::NaiveTime;
use strum::{EnumCount, EnumIter, IntoStaticStr};
use uuid::Uuid;

use crate::source::{Coordinates, LocoName, ValueSource, error::Result as SourceResult};

use super::process::error::{ListenerProcessFatalError, ProcessResult};

/// A value observed for a field during one sampling pass.
///
/// Regular (subscribed) fields always hold [`Scalar`](Self::Scalar) values. Special fields hold
/// the composite type of their reading. [`None`](Self::None) is the "no value" sentinel: it is
/// returned for fields absent from a [`Sample`] and is passed as the old value of a field's first
/// observed change.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    None,
    Scalar(f64),
    Coordinates(Coordinates),
    Bool(bool),
    Names(Vec<String>),
    Time(NaiveTime),
}

impl FieldValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Coordinates(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            Self::Names(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Coordinates(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Names(v) => write!(f, "[{}]", v.join(", ")),
            Self::Time(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Coordinates> for FieldValue {
    fn from(value: Coordinates) -> Self {
        Self::Coordinates(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<Option<LocoName>> for FieldValue {
    fn from(value: Option<LocoName>) -> Self {
        match value {
            Some(name) => Self::Names(name.into_parts()),
            None => Self::None,
        }
    }
}

static NO_VALUE: FieldValue = FieldValue::None;

/// Field values observed during one sampling pass, keyed by field identifier.
///
/// Special fields are keyed by their marker-prefixed identifier (e.g. `!FuelLevel`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample(HashMap<String, FieldValue>);

impl Sample {
    /// Returns the value of `field`, or [`FieldValue::None`] if the field has no value.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.0.get(field).unwrap_or(&NO_VALUE)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(super) fn insert(&mut self, field: &str, value: FieldValue) {
        self.0.insert(field.to_string(), value);
    }

    pub(super) fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.0.remove(field)
    }
}

impl Index<&str> for Sample {
    type Output = FieldValue;

    fn index(&self, field: &str) -> &Self::Output {
        self.get(field)
    }
}

/// Prefix distinguishing special field identifiers from controller names.
pub const SPECIAL_FIELD_MARKER: char = '!';

/// Returns the event name dispatched when the subscribed field `field` changes.
///
/// ```
/// use raildriver::listener::change_event_name;
///
/// assert_eq!(change_event_name("Reverser"), "on_reverser_change");
/// ```
pub fn change_event_name(field: &str) -> String {
    format!("on_{}_change", field.to_lowercase())
}

/// Derived readings sampled on every pass, regardless of subscriptions.
///
/// Iteration order (see [`strum::IntoEnumIterator`]) is the declaration order, which is also the
/// order in which special field changes are dispatched within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum SpecialField {
    #[strum(serialize = "!Coordinates")]
    Coordinates,
    #[strum(serialize = "!FuelLevel")]
    FuelLevel,
    #[strum(serialize = "!Gradient")]
    Gradient,
    #[strum(serialize = "!Heading")]
    Heading,
    #[strum(serialize = "!IsInTunnel")]
    IsInTunnel,
    #[strum(serialize = "!LocoName")]
    LocoName,
    #[strum(serialize = "!Time")]
    Time,
}

impl SpecialField {
    /// Returns the marker-prefixed identifier under which the field is stored in a [`Sample`].
    pub fn identifier(&self) -> &'static str {
        self.into()
    }

    /// Returns the event name dispatched when this field changes.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Coordinates => "on_coordinates_change",
            Self::FuelLevel => "on_fuellevel_change",
            Self::Gradient => "on_gradient_change",
            Self::Heading => "on_heading_change",
            Self::IsInTunnel => "on_isintunnel_change",
            Self::LocoName => "on_loconame_change",
            Self::Time => "on_time_change",
        }
    }

    pub(super) fn read(&self, source: &dyn ValueSource) -> SourceResult<FieldValue> {
        let value: FieldValue = match self {
            Self::Coordinates => source.coordinates()?.into(),
            Self::FuelLevel => source.fuel_level()?.into(),
            Self::Gradient => source.gradient()?.into(),
            Self::Heading => source.heading()?.into(),
            Self::IsInTunnel => source.is_in_tunnel()?.into(),
            Self::LocoName => source.loco_name()?.into(),
            Self::Time => source.clock_time()?.into(),
        };

        Ok(value)
    }
}

impl fmt::Display for SpecialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Error type callbacks may return to abort the sampling loop.
pub type CallbackError = Box<dyn Error + Send + Sync>;

/// Result returned by change callbacks.
pub type CallbackResult = Result<(), CallbackError>;

pub(super) type ChangeCallback =
    Arc<dyn Fn(&FieldValue, &FieldValue) -> CallbackResult + Send + Sync>;

/// Handle to a registered callback, used to remove it with
/// [`Listener::unbind`](super::Listener::unbind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(Uuid);

impl BindingId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Binding {
    id: BindingId,
    callback: ChangeCallback,
}

/// Callbacks keyed by event name, kept in registration order.
#[derive(Default)]
pub(super) struct BindingTable(HashMap<String, Vec<Binding>>);

impl BindingTable {
    pub fn insert(&mut self, event: String, callback: ChangeCallback) -> BindingId {
        let id = BindingId::new();
        self.0
            .entry(event)
            .or_default()
            .push(Binding { id, callback });
        id
    }

    pub fn remove(&mut self, id: BindingId) -> bool {
        let mut emptied = None;
        let mut removed = false;

        for (event, bindings) in self.0.iter_mut() {
            if let Some(pos) = bindings.iter().position(|b| b.id == id) {
                bindings.remove(pos);
                removed = true;
                if bindings.is_empty() {
                    emptied = Some(event.clone());
                }
                break;
            }
        }

        if let Some(event) = emptied {
            self.0.remove(&event);
        }

        removed
    }

    /// Returns the callbacks bound to `event`, in registration order.
    pub fn callbacks(&self, event: &str) -> Vec<ChangeCallback> {
        self.0
            .get(event)
            .map(|bindings| bindings.iter().map(|b| b.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Invokes a callback, converting both returned errors and panics into loop faults.
pub(super) fn invoke_callback(
    callback: &ChangeCallback,
    event: &str,
    new: &FieldValue,
    old: &FieldValue,
) -> ProcessResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| callback(new, old)))
        .map_err(|e| ListenerProcessFatalError::CallbackPanicked {
            event: event.to_string(),
            payload: e.into(),
        })?
        .map_err(|error| ListenerProcessFatalError::CallbackFailed {
            event: event.to_string(),
            error,
        })
}
