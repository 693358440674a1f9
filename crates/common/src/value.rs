// KLVE - JavaScript Execution Tracer
// Copyright (C) 2025 The KLVE authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Portable encoding of runtime values.
//!
//! A described value is a descriptor plus a heap. Primitives are inlined
//! in the descriptor; every compound value lives in the heap exactly once
//! and is referenced by index, so shared structure stays shared and
//! cycles terminate. [`undescribe`] is the inverse direction: it revives
//! a descriptor into an opaque object graph, restoring sharing and
//! cycles through memoization.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Type tag of an inlined primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// A string value
    String,
    /// A number value (also covers bigints, carried in `str` form)
    Number,
    /// A boolean value
    Boolean,
    /// The `null` value
    Null,
    /// The `undefined` value
    Undefined,
    /// A symbol, carried in its `toString()` form
    Symbol,
}

/// Shape tag of a heap entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapKind {
    /// A plain or class-constructed object
    Object,
    /// An array
    Array,
    /// A function value
    Function,
    /// A promise
    Promise,
}

/// A serialized runtime value: either an inlined primitive or a
/// reference into the accompanying heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum ValueDescriptor {
    /// An inlined primitive. `value` carries JSON-representable payloads;
    /// `str` carries the rest (symbols, non-finite numbers, bigints).
    Primitive {
        /// The primitive type tag
        #[serde(rename = "type")]
        kind: PrimitiveKind,
        /// JSON-representable payload, when the value has one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
        /// String rendering for payloads JSON cannot carry
        #[serde(default, skip_serializing_if = "Option::is_none")]
        str: Option<String>,
    },
    /// A reference to a compound value in the heap.
    Compound {
        /// Index into the heap
        at: usize,
    },
}

impl ValueDescriptor {
    /// The `undefined` descriptor.
    pub fn undefined() -> Self {
        Self::Primitive { kind: PrimitiveKind::Undefined, value: None, str: None }
    }

    /// The `null` descriptor.
    pub fn null() -> Self {
        Self::Primitive { kind: PrimitiveKind::Null, value: None, str: None }
    }

    /// A boolean descriptor.
    pub fn boolean(value: bool) -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Boolean,
            value: Some(serde_json::Value::Bool(value)),
            str: None,
        }
    }

    /// A number descriptor. Finite numbers are carried as JSON numbers;
    /// `NaN` and the infinities fall back to their string rendering.
    pub fn number(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(n) => Self::Primitive {
                kind: PrimitiveKind::Number,
                value: Some(serde_json::Value::Number(n)),
                str: None,
            },
            None => Self::Primitive {
                kind: PrimitiveKind::Number,
                value: None,
                str: Some(render_nonfinite(value)),
            },
        }
    }

    /// A string descriptor.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Primitive {
            kind: PrimitiveKind::String,
            value: Some(serde_json::Value::String(value.into())),
            str: None,
        }
    }

    /// A symbol descriptor, from its `toString()` form.
    pub fn symbol(rendered: impl Into<String>) -> Self {
        Self::Primitive { kind: PrimitiveKind::Symbol, value: None, str: Some(rendered.into()) }
    }

    /// A bigint descriptor, carried in string form under the number tag.
    pub fn bigint(rendered: impl Into<String>) -> Self {
        Self::Primitive { kind: PrimitiveKind::Number, value: None, str: Some(rendered.into()) }
    }
}

fn render_nonfinite(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value > 0.0 {
        "Infinity".to_string()
    } else {
        "-Infinity".to_string()
    }
}

/// One compound value in a described heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapObject {
    /// Shape of the value
    #[serde(rename = "type")]
    pub kind: HeapKind,
    /// Enumerable own properties, in property order
    pub entries: Vec<(String, ValueDescriptor)>,
    /// Array length, for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Constructor name, for class-constructed objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
}

/// A descriptor together with the heap it references. The pair is
/// self-contained: every `at` index points inside `heap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedValue {
    /// The root descriptor
    pub descriptor: ValueDescriptor,
    /// The heap referenced by compound descriptors
    pub heap: Vec<HeapObject>,
}

impl DescribedValue {
    /// Wrap a primitive descriptor with an empty heap.
    pub fn primitive(descriptor: ValueDescriptor) -> Self {
        debug_assert!(matches!(descriptor, ValueDescriptor::Primitive { .. }));
        Self { descriptor, heap: Vec::new() }
    }
}

/// A value revived from its described form. Compounds are opaque
/// placeholders: functions revive as empty markers, promises as
/// never-settling markers, arrays and classed objects carry their
/// length and constructor name.
#[derive(Debug, Clone)]
pub enum Revived {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// A boolean
    Boolean(bool),
    /// A number (including `NaN` and the infinities)
    Number(f64),
    /// A string
    String(String),
    /// A symbol, by its rendered form
    Symbol(String),
    /// A compound value; shared references and cycles are preserved
    Compound(Rc<RefCell<RevivedObject>>),
}

/// A revived compound value.
#[derive(Debug)]
pub struct RevivedObject {
    /// Shape of the original value
    pub kind: HeapKind,
    /// Constructor name of the original object, when recorded
    pub cname: Option<String>,
    /// Array length of the original value, when recorded
    pub length: Option<usize>,
    /// Revived enumerable own properties, in property order
    pub entries: Vec<(String, Revived)>,
}

/// Revive a described value into an opaque object graph. Objects are
/// memoized by heap index, so structure shared in the input is shared
/// in the output and cycles revive as cycles.
pub fn undescribe(value: &DescribedValue) -> Revived {
    let mut memo = HashMap::new();
    revive(&value.descriptor, &value.heap, &mut memo)
}

fn revive(
    descriptor: &ValueDescriptor,
    heap: &[HeapObject],
    memo: &mut HashMap<usize, Rc<RefCell<RevivedObject>>>,
) -> Revived {
    match descriptor {
        ValueDescriptor::Primitive { kind, value, str } => revive_primitive(*kind, value, str),
        ValueDescriptor::Compound { at } => {
            if let Some(existing) = memo.get(at) {
                return Revived::Compound(Rc::clone(existing));
            }
            let Some(object) = heap.get(*at) else {
                warn!(at, heap_len = heap.len(), "dangling heap reference");
                return Revived::Undefined;
            };
            let cell = Rc::new(RefCell::new(RevivedObject {
                kind: object.kind,
                cname: object.cname.clone(),
                length: object.length,
                entries: Vec::with_capacity(object.entries.len()),
            }));
            memo.insert(*at, Rc::clone(&cell));
            let entries: Vec<(String, Revived)> = object
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), revive(entry, heap, memo)))
                .collect();
            cell.borrow_mut().entries = entries;
            Revived::Compound(cell)
        }
    }
}

fn revive_primitive(
    kind: PrimitiveKind,
    value: &Option<serde_json::Value>,
    str: &Option<String>,
) -> Revived {
    match kind {
        PrimitiveKind::Undefined => Revived::Undefined,
        PrimitiveKind::Null => Revived::Null,
        PrimitiveKind::Boolean => {
            Revived::Boolean(value.as_ref().and_then(serde_json::Value::as_bool).unwrap_or(false))
        }
        PrimitiveKind::Number => match value.as_ref().and_then(serde_json::Value::as_f64) {
            Some(n) => Revived::Number(n),
            None => Revived::Number(parse_number_str(str.as_deref().unwrap_or("NaN"))),
        },
        PrimitiveKind::String => Revived::String(
            value.as_ref().and_then(serde_json::Value::as_str).unwrap_or_default().to_string(),
        ),
        PrimitiveKind::Symbol => Revived::Symbol(str.clone().unwrap_or_default()),
    }
}

fn parse_number_str(rendered: &str) -> f64 {
    match rendered {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        other => other.trim_end_matches('n').parse().unwrap_or(f64::NAN),
    }
}
