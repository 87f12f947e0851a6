//! Byte <-> pulse mapping invariants for arbitrary maps.

#![no_main]

use libfuzzer_sys::fuzz_target;
use windwall_proto::PulseMap;

fuzz_target!(|input: (u16, u16, u16, u16)| {
    let (idle, active_min, active_max, pulse) = input;
    let Ok(map) = PulseMap::new(idle, active_min, active_max) else {
        return;
    };

    assert_eq!(map.decode(0), map.idle());

    let mut previous = map.decode(1);
    for byte in 1..=u8::MAX {
        let decoded = map.decode(byte);
        assert!(decoded >= previous, "not monotonic at {byte}");
        assert!(decoded >= map.idle() && decoded <= map.active_max());
        previous = decoded;
    }

    let byte = map.encode(pulse);
    if pulse < map.active_min() {
        assert_eq!(byte, 0);
    } else {
        assert!(byte >= 1);
        // Quantization never moves a pulse by more than one step.
        let step = u32::from(map.active_max() - map.active_min()) / 254 + 1;
        let clamped = pulse.min(map.active_max());
        assert!(u32::from(map.decode(byte).abs_diff(clamped)) <= step);
    }
});
