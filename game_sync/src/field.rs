//! Discrete field changes on the parts of an entity.

use bytes::Bytes;
use game_common::entity::{EntityId, PartId};
use glam::{Quat, Vec3};
use thiserror::Error;

/// The new value of a synchronized field.
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Vector(Vec3),
    Quaternion(Quat),
    String(String),
    /// An opaque, already serialized value.
    Object(Bytes),
}

impl FieldValue {
    /// Returns `true` if all floating point components of the value are finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::Double(v) => v.is_finite(),
            Self::Vector(v) => v.is_finite(),
            Self::Quaternion(v) => v.is_finite(),
            Self::Bool(_) | Self::Int(_) | Self::String(_) | Self::Object(_) => true,
        }
    }

    /// Returns a short name of the value type.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Vector(_) => "vector",
            Self::Quaternion(_) => "quaternion",
            Self::String(_) => "string",
            Self::Object(_) => "object",
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl Clone for FieldValue {
    fn clone(&self) -> Self {
        match self {
            Self::Bool(v) => Self::Bool(*v),
            Self::Int(v) => Self::Int(*v),
            Self::Float(v) => Self::Float(*v),
            Self::Double(v) => Self::Double(*v),
            Self::Vector(v) => Self::Vector(*v),
            Self::Quaternion(v) => Self::Quaternion(*v),
            Self::String(v) => Self::String(v.clone()),
            Self::Object(v) => Self::Object(v.clone()),
        }
    }

    // Pooled records keep their string buffers around.
    fn clone_from(&mut self, source: &Self) {
        match (&mut *self, source) {
            (Self::String(dst), Self::String(src)) => dst.clone_from(src),
            (dst, src) => *dst = src.clone(),
        }
    }
}

/// A change of a single field of a module on a part.
#[derive(Debug, Default, PartialEq)]
pub struct FieldUpdate {
    pub part: PartId,
    pub module: String,
    pub field: String,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new<M, F>(part: PartId, module: M, field: F, value: FieldValue) -> Self
    where
        M: Into<String>,
        F: Into<String>,
    {
        Self {
            part,
            module: module.into(),
            field: field.into(),
            value,
        }
    }

    /// Checks that the update is well-formed.
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.module.is_empty() {
            return Err(UpdateError::EmptyModule);
        }

        if self.field.is_empty() {
            return Err(UpdateError::EmptyField);
        }

        if !self.value.is_finite() {
            return Err(UpdateError::NonFinite);
        }

        Ok(())
    }

    /// Drops all references held by the update while keeping allocated buffers.
    pub(crate) fn clear(&mut self) {
        self.part = PartId(0);
        self.module.clear();
        self.field.clear();
        self.value = FieldValue::default();
    }
}

impl Clone for FieldUpdate {
    fn clone(&self) -> Self {
        Self {
            part: self.part,
            module: self.module.clone(),
            field: self.field.clone(),
            value: self.value.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.part = source.part;
        self.module.clone_from(&source.module);
        self.field.clone_from(&source.field);
        self.value.clone_from(&source.value);
    }
}

/// An update that was rejected before it was buffered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("scheduled time is not finite")]
    InvalidTime,
    #[error("empty module name")]
    EmptyModule,
    #[error("empty field name")]
    EmptyField,
    #[error("field value is not finite")]
    NonFinite,
}

/// A due update could not be applied to the simulation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown part {0:?}")]
    UnknownPart(PartId),
    #[error("unknown module {0}")]
    UnknownModule(String),
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// The simulation side receiving due field updates.
pub trait FieldSink {
    fn apply_field(&mut self, entity: EntityId, update: &FieldUpdate) -> Result<(), ApplyError>;
}

impl<T> FieldSink for &mut T
where
    T: FieldSink + ?Sized,
{
    #[inline]
    fn apply_field(&mut self, entity: EntityId, update: &FieldUpdate) -> Result<(), ApplyError> {
        (**self).apply_field(entity, update)
    }
}
