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

//! Runtime value description.
//!
//! Maps an engine value onto the portable descriptor-plus-heap form.
//! The writer map keys on object identity, so every compound value is
//! described at most once per call: shared structure stays shared and
//! cycles terminate as back references.

use boa_engine::{
    builtins::object::OrdinaryObject, js_string, object::builtins::JsArray,
    property::PropertyKey, Context, JsObject, JsValue,
};
use klve_common::{DescribedValue, HeapKind, HeapObject, ValueDescriptor};

/// Describe one runtime value with a fresh heap.
pub(crate) fn describe(value: &JsValue, context: &mut Context) -> DescribedValue {
    let mut heap = Vec::new();
    let mut writer = Vec::new();
    let descriptor = describe_value(value, &mut heap, &mut writer, context);
    DescribedValue { descriptor, heap }
}

fn describe_value(
    value: &JsValue,
    heap: &mut Vec<HeapObject>,
    writer: &mut Vec<(JsObject, usize)>,
    context: &mut Context,
) -> ValueDescriptor {
    if value.is_undefined() {
        return ValueDescriptor::undefined();
    }
    if value.is_null() {
        return ValueDescriptor::null();
    }
    if let Some(boolean) = value.as_boolean() {
        return ValueDescriptor::boolean(boolean);
    }
    if let Some(number) = value.as_number() {
        return ValueDescriptor::number(number);
    }
    if let Some(string) = value.as_string() {
        return ValueDescriptor::string(string.to_std_string_escaped());
    }
    if let Some(symbol) = value.as_symbol() {
        let description =
            symbol.description().map(|d| d.to_std_string_escaped()).unwrap_or_default();
        return ValueDescriptor::symbol(format!("Symbol({description})"));
    }
    if let Some(bigint) = value.as_bigint() {
        return ValueDescriptor::bigint(format!("{bigint}n"));
    }
    match value.as_object() {
        Some(object) => describe_object(&object.clone(), heap, writer, context),
        None => ValueDescriptor::undefined(),
    }
}

fn describe_object(
    object: &JsObject,
    heap: &mut Vec<HeapObject>,
    writer: &mut Vec<(JsObject, usize)>,
    context: &mut Context,
) -> ValueDescriptor {
    if let Some((_, at)) = writer.iter().find(|(seen, _)| seen == object) {
        return ValueDescriptor::Compound { at: *at };
    }

    // Reserve the slot before recursing so back references resolve.
    let at = heap.len();
    heap.push(HeapObject { kind: HeapKind::Object, entries: Vec::new(), length: None, cname: None });
    writer.push((object.clone(), at));

    let kind = classify(object, context);
    let length = match kind {
        HeapKind::Array => object
            .get(js_string!("length"), context)
            .ok()
            .and_then(|value| value.as_number())
            .map(|length| length as usize),
        _ => None,
    };
    let cname = match kind {
        HeapKind::Object => constructor_name(object, context),
        _ => None,
    };

    let mut entries = Vec::new();
    for key in own_enumerable_keys(object, context) {
        // Getter reads are guarded; a throwing getter contributes no entry.
        let Ok(value) = object.get(key.clone(), context) else { continue };
        let descriptor = describe_value(&value, heap, writer, context);
        entries.push((property_key_name(&key), descriptor));
    }

    heap[at] = HeapObject { kind, entries, length, cname };
    ValueDescriptor::Compound { at }
}

fn classify(object: &JsObject, context: &mut Context) -> HeapKind {
    if object.is_callable() {
        return HeapKind::Function;
    }
    if is_promise_like(object, context) {
        return HeapKind::Promise;
    }
    if JsArray::from_object(object.clone()).is_ok() {
        return HeapKind::Array;
    }
    HeapKind::Object
}

/// Thenable detection: anything carrying callable `then` and `catch`.
fn is_promise_like(object: &JsObject, context: &mut Context) -> bool {
    let is_method = |name, context: &mut Context| {
        object
            .get(js_string!(name), context)
            .ok()
            .and_then(|value| value.as_object().map(|method| method.clone()))
            .is_some_and(|method| method.is_callable())
    };
    let then = is_method("then", context);
    then && is_method("catch", context)
}

fn constructor_name(object: &JsObject, context: &mut Context) -> Option<String> {
    let constructor = object.get(js_string!("constructor"), context).ok()?;
    let constructor = constructor.as_object()?.clone();
    let name = constructor.get(js_string!("name"), context).ok()?;
    let name = name.as_string()?.to_std_string_escaped();
    (!name.is_empty()).then_some(name)
}

/// Own enumerable non-symbol keys, in ordinary own-key order.
fn own_enumerable_keys(object: &JsObject, context: &mut Context) -> Vec<PropertyKey> {
    let Ok(keys) = object.own_property_keys(context) else {
        return Vec::new();
    };
    keys.into_iter()
        .filter(|key| !matches!(key, PropertyKey::Symbol(_)))
        .filter(|key| is_enumerable(object, key, context))
        .collect()
}

/// Enumerable check via the public `Object.getOwnPropertyDescriptor` builtin,
/// since the internal `[[GetOwnProperty]]` method is crate-private.
fn is_enumerable(object: &JsObject, key: &PropertyKey, context: &mut Context) -> bool {
    let args = [JsValue::from(object.clone()), JsValue::from(key)];
    let Ok(descriptor) =
        OrdinaryObject::get_own_property_descriptor(&JsValue::undefined(), &args, context)
    else {
        return false;
    };
    let Some(descriptor) = descriptor.as_object() else {
        return false;
    };
    descriptor
        .get(js_string!("enumerable"), context)
        .ok()
        .is_some_and(|value| value.to_boolean())
}

fn property_key_name(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(string) => string.to_std_string_escaped(),
        PropertyKey::Index(index) => index.get().to_string(),
        PropertyKey::Symbol(symbol) => symbol.to_string(),
    }
}
