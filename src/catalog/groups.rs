//! Built-in wrapping groups
//!
//! Order matters only for presentation; ids, variant order and surface ids
//! are part of the persisted format.

use super::{Group, ParamValue, Variant, VariantParams};

fn int(v: i64) -> ParamValue {
    ParamValue::Int(v)
}

fn flag(v: bool) -> ParamValue {
    ParamValue::Bool(v)
}

fn variant(label: &str, params: &[ParamValue]) -> Variant {
    Variant {
        label: label.to_string(),
        params: VariantParams(params.to_vec()),
    }
}

fn group(id: &str, label: &str, variants: Vec<Variant>, surfaces: &[&str]) -> Group {
    Group {
        id: id.to_string(),
        label: label.to_string(),
        variants,
        surfaces: surfaces.iter().map(|s| s.to_string()).collect(),
    }
}

/// Labels of the canvas variants; variant `n` carries approach `n - 1`.
const CANVAS_VARIANT_LABELS: [&str; 34] = [
    "Little lies",
    "Strict",
    "5% noise",
    "10% noise",
    "FPRandom off",
    "FPRandom on",
    "Smoothing 10%",
    "Noise of randomly selected channels",
    "Bit flip - 2 bits",
    "Bit flip - 3 bits",
    "Bit flip - 4 bits",
    "Bit flip - 5 bits",
    "Bit flip - 6 bits",
    "Bit flip - 7 bits",
    "Negate 15% of pixels",
    "Negate 20% of pixels",
    "Negate 25% of pixels",
    "Negate 50% of pixels",
    "Smoothing 20%",
    "Smoothing 30%",
    "Smoothing 50%",
    "Mapping threshold 1",
    "Mapping threshold 2",
    "Mapping threshold 3",
    "Mapping threshold 4",
    "Mapping threshold 5",
    "Mapping threshold 10",
    "Mapping threshold 50",
    "Mapping threshold 100",
    "Mapping threshold 1000",
    "Mapping threshold 10000",
    "Mapping threshold 100000",
    "Mapping threshold 1000000",
    "Mapping threshold 10000000",
];

fn canvas_variants() -> Vec<Variant> {
    CANVAS_VARIANT_LABELS
        .iter()
        .enumerate()
        .map(|(approach, label)| variant(label, &[int(approach as i64)]))
        .collect()
}

fn little_lies_or_strict() -> Vec<Variant> {
    vec![
        variant("Little lies", &[int(0)]),
        variant("Strict", &[int(1)]),
    ]
}

/// The full built-in group table.
pub fn builtin_groups() -> Vec<Group> {
    vec![
        group(
            "time_precision",
            "Time precision",
            vec![
                variant("Poor", &[int(2), flag(false)]),
                variant("Low", &[int(1), flag(false)]),
                variant("High", &[int(0), flag(true)]),
            ],
            &[
                "Performance.prototype.now",
                "PerformanceEntry.prototype",
                "window.Date",
                "Event.prototype.timeStamp",
                "Gamepad.prototype.timestamp",
                "VRFrameData.prototype.timestamp",
                "Sensor.prototype.timestamp",
            ],
        ),
        group(
            "htmlcanvaselement",
            "Locally rendered images",
            canvas_variants(),
            &[
                "CanvasRenderingContext2D.prototype.getImageData",
                "HTMLCanvasElement.prototype.toBlob",
                "HTMLCanvasElement.prototype.toDataURL",
                "OffscreenCanvas.prototype.convertToBlob",
                "CanvasRenderingContext2D.prototype.isPointInStroke",
                "CanvasRenderingContext2D.prototype.isPointInPath",
                "WebGLRenderingContext.prototype.readPixels",
                "WebGL2RenderingContext.prototype.readPixels",
            ],
        ),
        group(
            "audiobuffer",
            "Locally generated audio",
            little_lies_or_strict(),
            &[
                "AudioBuffer.prototype.getChannelData",
                "AudioBuffer.prototype.copyFromChannel",
                "AnalyserNode.prototype.getByteTimeDomainData",
                "AnalyserNode.prototype.getFloatTimeDomainData",
                "AnalyserNode.prototype.getByteFrequencyData",
                "AnalyserNode.prototype.getFloatFrequencyData",
            ],
        ),
        group(
            "webgl",
            "Graphic card information",
            little_lies_or_strict(),
            &[
                "WebGLRenderingContext.prototype.getParameter",
                "WebGL2RenderingContext.prototype.getParameter",
                "WebGLRenderingContext.prototype.getFramebufferAttachmentParameter",
                "WebGL2RenderingContext.prototype.getFramebufferAttachmentParameter",
                "WebGLRenderingContext.prototype.getActiveAttrib",
                "WebGL2RenderingContext.prototype.getActiveAttrib",
                "WebGLRenderingContext.prototype.getActiveUniform",
                "WebGL2RenderingContext.prototype.getActiveUniform",
                "WebGLRenderingContext.prototype.getAttribLocation",
                "WebGL2RenderingContext.prototype.getAttribLocation",
                "WebGLRenderingContext.prototype.getBufferParameter",
                "WebGL2RenderingContext.prototype.getBufferParameter",
                "WebGLRenderingContext.prototype.getProgramParameter",
                "WebGL2RenderingContext.prototype.getProgramParameter",
                "WebGLRenderingContext.prototype.getRenderbufferParameter",
                "WebGL2RenderingContext.prototype.getRenderbufferParameter",
                "WebGLRenderingContext.prototype.getShaderParameter",
                "WebGL2RenderingContext.prototype.getShaderParameter",
                "WebGLRenderingContext.prototype.getShaderPrecisionFormat",
                "WebGL2RenderingContext.prototype.getShaderPrecisionFormat",
                "WebGLRenderingContext.prototype.getTexParameter",
                "WebGL2RenderingContext.prototype.getTexParameter",
                "WebGLRenderingContext.prototype.getUniformLocation",
                "WebGL2RenderingContext.prototype.getUniformLocation",
                "WebGLRenderingContext.prototype.getVertexAttribOffset",
                "WebGL2RenderingContext.prototype.getVertexAttribOffset",
                "WebGLRenderingContext.prototype.getSupportedExtensions",
                "WebGL2RenderingContext.prototype.getSupportedExtensions",
                "WebGLRenderingContext.prototype.getExtension",
                "WebGL2RenderingContext.prototype.getExtension",
            ],
        ),
        group(
            "plugins",
            "Installed browser plugins",
            vec![
                variant("Little lies", &[int(0)]),
                variant("Fake", &[int(1)]),
                variant("Strict", &[int(2)]),
            ],
            &["Navigator.prototype.plugins"],
        ),
        group(
            "enumerateDevices",
            "Connected cameras and microphones",
            vec![
                variant("Little lies", &[int(0)]),
                variant("Add fake", &[int(1)]),
                variant("Strict", &[int(2)]),
            ],
            &["MediaDevices.prototype.enumerateDevices"],
        ),
        group(
            "hardware",
            "Hardware",
            vec![
                variant("Low", &[int(0)]),
                variant("Medium", &[int(1)]),
                variant("High", &[int(2)]),
            ],
            &[
                "Navigator.prototype.hardwareConcurrency",
                "Navigator.prototype.deviceMemory",
            ],
        ),
        group(
            "net",
            "Network conditions",
            vec![variant("Remove", &[int(0)])],
            &["Navigator.prototype.connection", "window.NetworkInformation"],
        ),
        group(
            "xhr",
            "XMLHttpRequest requests",
            vec![
                variant("Ask", &[flag(false), flag(true)]),
                variant("Block", &[flag(true), flag(false)]),
            ],
            &[
                "XMLHttpRequest.prototype.open",
                "XMLHttpRequest.prototype.send",
            ],
        ),
        group(
            "arrays",
            "Arrays",
            vec![
                variant("Shift", &[flag(false)]),
                variant("Randomize", &[flag(true)]),
            ],
            &[
                "window.DataView",
                "window.Uint8Array",
                "window.Int8Array",
                "window.Uint8ClampedArray",
                "window.Int16Array",
                "window.Uint16Array",
                "window.Int32Array",
                "window.Uint32Array",
                "window.Float32Array",
                "window.Float64Array",
                "window.BigInt64Array",
                "window.BigUint64Array",
            ],
        ),
        group(
            "shared_array",
            "SharedArrayBuffer",
            vec![
                variant("Medium", &[flag(false)]),
                variant("Strict", &[flag(true)]),
            ],
            &["window.SharedArrayBuffer"],
        ),
        group(
            "webworker",
            "Web workers",
            vec![
                variant("Low", &[flag(false), flag(false)]),
                variant("Strict", &[flag(true), flag(false)]),
                variant("Remove", &[flag(false), flag(true)]),
            ],
            &["window.Worker"],
        ),
        group(
            "geolocation",
            "Physical location (geolocation)",
            vec![
                variant("Timestamp only", &[int(-1)]),
                variant("Village", &[int(2)]),
                variant("Town", &[int(3)]),
                variant("Region", &[int(4)]),
                variant("Long distance", &[int(5)]),
                variant("Remove", &[int(0)]),
            ],
            &[
                "Navigator.prototype.geolocation",
                "window.Geolocation",
                "window.GeolocationCoordinates",
                "window.GeolocationPosition",
                "window.GeolocationPositionError",
                "Geolocation.prototype.getCurrentPosition",
                "Geolocation.prototype.watchPosition",
                "Geolocation.prototype.clearWatch",
            ],
        ),
        group(
            "physical_environment",
            "Physical environment sensors",
            vec![variant("High", &[flag(true)])],
            &[
                "Magnetometer.prototype.x",
                "Magnetometer.prototype.y",
                "Magnetometer.prototype.z",
                "Accelerometer.prototype.x",
                "Accelerometer.prototype.y",
                "Accelerometer.prototype.z",
                "Gyroscope.prototype.x",
                "Gyroscope.prototype.y",
                "Gyroscope.prototype.z",
                "OrientationSensor.prototype.quaternion",
                "AmbientLightSensor.prototype.illuminance",
            ],
        ),
        group(
            "useridle",
            "User idle detection",
            vec![
                variant("Confuse", &[int(0)]),
                variant("Block", &[int(1)]),
                variant("Remove", &[int(2)]),
            ],
            &[
                "window.IdleDetector",
                "IdleDetector.requestPermission",
                "IdleDetector.prototype.screenState",
                "IdleDetector.prototype.userState",
            ],
        ),
        group(
            "coopschedule",
            "Idle period scheduling",
            vec![variant("Confuse", &[])],
            &[
                "IdleDeadline.prototype.didTimeout",
                "IdleDeadline.prototype.timeRemaining",
            ],
        ),
        group(
            "gamepads",
            "Gamepads",
            vec![variant("Strict", &[flag(true)])],
            &["Navigator.prototype.getGamepads"],
        ),
        group(
            "vr",
            "Virtual and augmented reality devices",
            vec![variant("Strict", &[])],
            &["Navigator.prototype.activeVRDisplays", "Navigator.prototype.xr"],
        ),
        group(
            "playback",
            "Multimedia playback",
            vec![
                variant("Little lies", &[int(0)]),
                variant("Strict", &[int(1)]),
                variant("Block", &[int(2)]),
            ],
            &[
                "Navigator.prototype.requestMediaKeySystemAccess",
                "MediaCapabilities.prototype.encodingInfo",
                "MediaCapabilities.prototype.decodingInfo",
                "HTMLMediaElement.prototype.canPlayType",
            ],
        ),
        group(
            "analytics",
            "Unreliable transfers to server (beacons)",
            vec![variant("Block", &[])],
            &["Navigator.prototype.sendBeacon"],
        ),
        group(
            "battery",
            "Hardware battery",
            vec![variant("Remove", &[])],
            &["Navigator.prototype.getBattery", "window.BatteryManager"],
        ),
        group(
            "windowname",
            "Persistent identifier of the browser tab",
            vec![variant("Strict", &[])],
            &["window.name"],
        ),
        group(
            "nfc",
            "NFC",
            vec![variant("Remove", &[])],
            &["window.NDEFMessage", "window.NDEFReader", "window.NDEFRecord"],
        ),
        // Policy-only: tunes how canvas, webgl and audio farbling is executed.
        group(
            "wasm",
            "WebAssembly farbling",
            vec![
                variant("Disabled", &[int(0)]),
                variant("Passive", &[int(1)]),
                variant("Active", &[int(2)]),
            ],
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_variant_carries_approach() {
        let groups = builtin_groups();
        let canvas = groups.iter().find(|g| g.id == "htmlcanvaselement").unwrap();
        for (idx, variant) in canvas.variants.iter().enumerate() {
            assert_eq!(variant.params.first_int(), Some(idx as i64));
        }
    }

    #[test]
    fn test_wasm_group_is_policy_only() {
        let groups = builtin_groups();
        let wasm = groups.iter().find(|g| g.id == "wasm").unwrap();
        assert!(wasm.is_policy_only());
        assert_eq!(wasm.variants.len(), 3);
    }
}
