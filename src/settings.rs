use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::uniforms::{RotationAxis, RotationSettings};

/// Field name of the rotation angle control.
pub const ROTATION_DEGREE_FIELD: &str = "rotationDegree";
/// Field name of the rotation axis control.
pub const ROTATION_AXIS_FIELD: &str = "axis";

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("unknown setting {0:?}")]
    UnknownField(String),
    #[error("setting {0:?} has a different type")]
    TypeMismatch(String),
    #[error("{value:?} is not a choice of setting {field:?}")]
    InvalidChoice { field: String, value: String },
    #[error("setting {field:?} has an empty range [{min}, {max}]")]
    InvalidRange { field: String, min: f32, max: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Number(f32),
    Choice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Numeric { min: f32, max: f32 },
    Choice { choices: Vec<String> },
}

type ChangeCallback = Box<dyn FnMut(&SettingValue)>;

/// A named control with its current value.
pub struct Field {
    name: String,
    value: SettingValue,
    kind: FieldKind,
    callbacks: Vec<ChangeCallback>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("kind", &self.kind)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Named numeric and enum controls that notify listeners synchronously on change.
#[derive(Debug, Default)]
pub struct InteractiveSettings {
    fields: Vec<Field>,
}

impl InteractiveSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a numeric field; `value` is clamped to `[min, max]`.
    pub fn add_number(
        &mut self,
        name: &str,
        value: f32,
        min: f32,
        max: f32,
    ) -> Result<&mut Self, SettingsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(SettingsError::InvalidRange {
                field: name.to_string(),
                min,
                max,
            });
        }
        self.fields.push(Field {
            name: name.to_string(),
            value: SettingValue::Number(value.clamp(min, max)),
            kind: FieldKind::Numeric { min, max },
            callbacks: Vec::new(),
        });
        Ok(self)
    }

    /// Registers a choice field; `value` must be one of `choices`.
    pub fn add_choice(
        &mut self,
        name: &str,
        value: &str,
        choices: &[&str],
    ) -> Result<&mut Self, SettingsError> {
        if !choices.contains(&value) {
            return Err(SettingsError::InvalidChoice {
                field: name.to_string(),
                value: value.to_string(),
            });
        }
        self.fields.push(Field {
            name: name.to_string(),
            value: SettingValue::Choice(value.to_string()),
            kind: FieldKind::Choice {
                choices: choices.iter().map(|choice| choice.to_string()).collect(),
            },
            callbacks: Vec::new(),
        });
        Ok(self)
    }

    /// Adds a listener invoked after every change of `name`.
    pub fn on_change(
        &mut self,
        name: &str,
        callback: impl FnMut(&SettingValue) + 'static,
    ) -> Result<(), SettingsError> {
        self.field_mut(name)?.callbacks.push(Box::new(callback));
        Ok(())
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn value(&self, name: &str) -> Option<&SettingValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Sets a numeric field, clamping to its range, and notifies listeners.
    pub fn set_number(&mut self, name: &str, value: f32) -> Result<f32, SettingsError> {
        let field = self.field_mut(name)?;
        let FieldKind::Numeric { min, max } = field.kind else {
            return Err(SettingsError::TypeMismatch(name.to_string()));
        };
        let value = value.clamp(min, max);
        field.value = SettingValue::Number(value);
        notify(field);
        Ok(value)
    }

    /// Selects one of a choice field's options and notifies listeners.
    pub fn set_choice(&mut self, name: &str, value: &str) -> Result<(), SettingsError> {
        let field = self.field_mut(name)?;
        let FieldKind::Choice { choices } = &field.kind else {
            return Err(SettingsError::TypeMismatch(name.to_string()));
        };
        if !choices.iter().any(|choice| choice == value) {
            return Err(SettingsError::InvalidChoice {
                field: name.to_string(),
                value: value.to_string(),
            });
        }
        field.value = SettingValue::Choice(value.to_string());
        notify(field);
        Ok(())
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut Field, SettingsError> {
        self.fields
            .iter_mut()
            .find(|field| field.name == name)
            .ok_or_else(|| SettingsError::UnknownField(name.to_string()))
    }
}

fn notify(field: &mut Field) {
    debug!("setting {} changed to {:?}", field.name, field.value);
    let value = field.value.clone();
    for callback in &mut field.callbacks {
        callback(&value);
    }
}

/// Change to the rotation controls, applied at the start of the next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsEvent {
    RotationDegree(f32),
    RotationAxis(RotationAxis),
}

/// Queue of pending settings changes shared between controls and the frame loop.
#[derive(Debug, Clone, Default)]
pub struct SettingsQueue {
    events: Arc<Mutex<VecDeque<SettingsEvent>>>,
}

impl SettingsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: SettingsEvent) {
        self.events.lock().push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Folds every pending event into `settings`; returns whether anything changed.
    pub fn apply_pending(&self, settings: &mut RotationSettings) -> bool {
        let mut events = self.events.lock();
        if events.is_empty() {
            return false;
        }
        for event in events.drain(..) {
            match event {
                SettingsEvent::RotationDegree(degree) => settings.degree = degree,
                SettingsEvent::RotationAxis(axis) => settings.axis = axis,
            }
        }
        *settings = RotationSettings::new(settings.degree, settings.axis);
        true
    }
}

/// Builds the `axis` and `rotationDegree` controls, forwarding changes to `queue`.
pub fn rotation_controls(
    initial: RotationSettings,
    queue: &SettingsQueue,
) -> Result<InteractiveSettings, SettingsError> {
    let mut settings = InteractiveSettings::new();
    settings
        .add_choice(ROTATION_AXIS_FIELD, initial.axis.name(), &RotationAxis::NAMES)?
        .add_number(
            ROTATION_DEGREE_FIELD,
            initial.degree,
            0.0,
            RotationSettings::MAX_DEGREE,
        )?;

    let axis_queue = queue.clone();
    let degree_queue = queue.clone();
    settings.on_change(ROTATION_AXIS_FIELD, move |value| {
        if let SettingValue::Choice(name) = value {
            if let Some(axis) = RotationAxis::from_name(name) {
                axis_queue.push(SettingsEvent::RotationAxis(axis));
            }
        }
    })?;
    settings.on_change(ROTATION_DEGREE_FIELD, move |value| {
        if let SettingValue::Number(degree) = value {
            degree_queue.push(SettingsEvent::RotationDegree(*degree));
        }
    })?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn numeric_values_are_clamped() {
        let mut settings = InteractiveSettings::new();
        settings.add_number("gain", 5.0, 0.0, 1.0).unwrap();
        assert_eq!(settings.value("gain"), Some(&SettingValue::Number(1.0)));
        assert_eq!(settings.set_number("gain", -3.0), Ok(0.0));
    }

    #[test]
    fn callbacks_fire_synchronously() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut settings = InteractiveSettings::new();
        settings.add_number("gain", 0.0, 0.0, 10.0).unwrap();
        let sink = Rc::clone(&seen);
        settings
            .on_change("gain", move |value| sink.borrow_mut().push(value.clone()))
            .unwrap();
        settings.set_number("gain", 4.0).unwrap();
        assert_eq!(seen.borrow().as_slice(), &[SettingValue::Number(4.0)]);
    }

    #[test]
    fn invalid_updates_are_rejected() {
        let mut settings = InteractiveSettings::new();
        settings.add_choice("axis", "x", &["x", "y"]).unwrap();
        assert_eq!(
            settings.set_choice("axis", "w"),
            Err(SettingsError::InvalidChoice {
                field: "axis".into(),
                value: "w".into()
            })
        );
        assert_eq!(
            settings.set_number("axis", 1.0),
            Err(SettingsError::TypeMismatch("axis".into()))
        );
        assert_eq!(
            settings.set_number("missing", 1.0),
            Err(SettingsError::UnknownField("missing".into()))
        );
    }

    #[test]
    fn inverted_range_is_rejected_at_registration() {
        let mut settings = InteractiveSettings::new();
        assert_eq!(
            settings.add_number("gain", 0.5, 1.0, 0.0).err(),
            Some(SettingsError::InvalidRange {
                field: "gain".into(),
                min: 1.0,
                max: 0.0
            })
        );
        assert!(settings.add_number("gain", 0.5, f32::NAN, 1.0).is_err());
        assert!(settings.value("gain").is_none());
    }

    #[test]
    fn initial_choice_must_be_listed() {
        let mut settings = InteractiveSettings::new();
        assert!(settings.add_choice("axis", "w", &["x", "y"]).is_err());
        assert!(settings.fields().next().is_none());
    }

    #[test]
    fn rotation_controls_feed_queue() {
        let queue = SettingsQueue::new();
        let mut controls = rotation_controls(RotationSettings::default(), &queue).unwrap();
        controls.set_choice(ROTATION_AXIS_FIELD, "z").unwrap();
        controls.set_number(ROTATION_DEGREE_FIELD, 45.0).unwrap();

        let mut rotation = RotationSettings::default();
        assert!(queue.apply_pending(&mut rotation));
        assert_eq!(rotation, RotationSettings::new(45.0, RotationAxis::Z));
        assert!(queue.is_empty());
        assert!(!queue.apply_pending(&mut rotation));
    }
}
