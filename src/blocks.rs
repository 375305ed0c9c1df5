//! Block command surface
//!
//! The host dispatches blocks by opcode with a JSON object of arguments.
//! Argument values follow the host's loose number rules: numbers pass
//! through, numeric strings parse, booleans become 1 or 0.

use std::time::Duration;

use serde_json::Value;

use crate::color::RGBA;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::light::{Beam, DEFAULT_QUALITY, Light, LightUpdate};

/// What a block reports back to the host
#[derive(Debug, Clone, PartialEq)]
pub enum BlockValue {
    /// Command blocks
    Done,
    Number(f32),
    Bool(bool),
}

/// Host number coercion: missing, null and blank strings are 0, junk is NaN.
pub fn to_number(value: Option<&Value>) -> f32 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().map_or(f32::NAN, |v| v as f32),
        Some(Value::Bool(b)) => f32::from(u8::from(*b)),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse::<f32>().unwrap_or(f32::NAN) }
        }
        Some(_) => f32::NAN,
    }
}

/// Host string coercion
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// True only for boolean `true` or the string `"true"`
pub fn to_flag(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true))) || matches!(value, Some(Value::String(s)) if s == "true")
}

#[inline]
fn or_default(value: f32, default: f32) -> f32 {
    if value == 0.0 || value.is_nan() { default } else { value }
}

/// Any positive quality casts at least one ray
#[inline]
fn ray_quality(value: f32) -> i32 {
    value.ceil() as i32
}

/// Absolute setters store NaN as 0
#[inline]
fn finite_or_zero(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value }
}

fn parse_color(value: Option<&Value>) -> Option<RGBA> {
    let text = to_text(value);
    if text.is_empty() {
        return None;
    }
    let color = RGBA::parse(&text);
    if color.is_none() {
        log::warn!("Unrecognised colour '{}', keeping the previous one", text);
    }
    color
}

/// Run one block against the engine at host time `now`.
pub fn dispatch(engine: &mut Engine, opcode: &str, args: &Value, now: Duration) -> Result<BlockValue> {
    let Some(args) = args.as_object() else {
        return Err(EngineError::InvalidArguments { opcode: opcode.to_string() });
    };
    let num = |key: &str| to_number(args.get(key));
    let id = to_text(args.get("ID"));
    let field = engine.field_mut();

    log::trace!("Block {} {:?}", opcode, args);
    match opcode {
        "addLight" => {
            let quality = or_default(num("QUALITY"), DEFAULT_QUALITY as f32);
            let light = Light {
                position: glam::Vec2::new(or_default(num("X"), 0.0), or_default(num("Y"), 0.0)),
                radius: or_default(num("SIZE"), 100.0),
                intensity: or_default(num("INTENSITY"), 100.0),
                color: parse_color(args.get("COLOR")).unwrap_or_else(RGBA::white),
                quality: ray_quality(quality),
                show_rays: to_flag(args.get("SHOW_RAYS")),
            };
            field.add_light(&id, light);
        }
        "updateLight" => {
            let update = LightUpdate {
                x: num("X"),
                y: num("Y"),
                radius: num("SIZE"),
                intensity: num("INTENSITY"),
                color: parse_color(args.get("COLOR")),
                quality: ray_quality(finite_or_zero(num("QUALITY"))),
                show_rays: to_flag(args.get("SHOW_RAYS")),
            };
            field.update_light(&id, update);
        }
        "removeLight" => field.remove_light(&id),
        "addBeam" => {
            let beam = Beam {
                position: glam::Vec2::new(finite_or_zero(num("X")), finite_or_zero(num("Y"))),
                angle: finite_or_zero(num("ANGLE")),
                length: finite_or_zero(num("LENGTH")),
                width: finite_or_zero(num("WIDTH")),
                intensity: finite_or_zero(num("INTENSITY")),
            };
            field.add_beam(&id, beam);
        }
        "removeBeam" => field.remove_beam(&id),
        "moveBeam" => field.move_beam(
            &id,
            finite_or_zero(num("X")),
            finite_or_zero(num("Y")),
            finite_or_zero(num("ANGLE")),
        ),
        "moveLight" => field.move_light(&id, finite_or_zero(num("X")), finite_or_zero(num("Y"))),
        "moveLightSmooth" => field.move_light_smooth(
            &id,
            finite_or_zero(num("X")),
            finite_or_zero(num("Y")),
            num("DURATION"),
            now,
        ),
        "moveBeamSmooth" => field.move_beam_smooth(
            &id,
            finite_or_zero(num("X")),
            finite_or_zero(num("Y")),
            finite_or_zero(num("ANGLE")),
            num("DURATION"),
            now,
        ),
        "changeLightIntensity" => field.change_light_intensity(&id, finite_or_zero(num("CHANGE"))),
        "changeLightSize" => field.change_light_size(&id, finite_or_zero(num("CHANGE"))),
        "setAmbientLight" => field.set_ambient(finite_or_zero(num("INTENSITY"))),
        "removeAllEffects" => field.remove_all_effects(),
        "getLightX" => return Ok(BlockValue::Number(field.light_x(&id))),
        "getLightY" => return Ok(BlockValue::Number(field.light_y(&id))),
        "getLightIntensity" => return Ok(BlockValue::Number(field.light_intensity(&id))),
        "getAmbientLight" => return Ok(BlockValue::Number(field.ambient())),
        "isLightExists" => return Ok(BlockValue::Bool(field.has_light(&id))),
        _ => return Err(EngineError::UnknownOpcode(opcode.to_string())),
    }
    Ok(BlockValue::Done)
}
