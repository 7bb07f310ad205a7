//! GPIO pin assignments for the ranging board.
//!
//! Single source of truth for the default wiring.  Configuration refers to
//! pins by name (`"gpio15"`); [`resolve`] turns a name into a GPIO number
//! and rejects anything the board does not route.

// ---------------------------------------------------------------------------
// Ultrasonic ranger (HC-SR04)
// ---------------------------------------------------------------------------

/// Digital output: trigger pulse (≥ 10 µs HIGH).
pub const TRIGGER_GPIO: i32 = 15;
/// Digital input, interrupt on both edges: echo.
pub const ECHO_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// RGB indicator switch (discrete LEDs, one pin each)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 11;
pub const LED_G_GPIO: i32 = 12;
pub const LED_B_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Piezo buzzer (LEDC PWM)
// ---------------------------------------------------------------------------

pub const BUZZER_PWM_GPIO: i32 = 18;

/// Every GPIO the board routes to a header.
pub const ROUTED_GPIOS: [i32; 6] = [
    TRIGGER_GPIO,
    ECHO_GPIO,
    LED_R_GPIO,
    LED_G_GPIO,
    LED_B_GPIO,
    BUZZER_PWM_GPIO,
];

/// Resolve a pin name of the form `gpioN` (case-insensitive) to a routed
/// GPIO number.
pub fn resolve(name: &str) -> Option<i32> {
    let name = name.trim();
    let digits = name
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("gpio"))
        .map(|_| &name[4..])?;
    let gpio: i32 = digits.parse().ok()?;
    ROUTED_GPIOS.contains(&gpio).then_some(gpio)
}
