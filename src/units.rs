/// Resolution of the acquisition board's converter
pub const DEFAULT_ADC_RESOLUTION: u32 = 12;
/// Converter reference voltage
pub const DEFAULT_MAX_VOLTAGE: f64 = 3.3;

/// Convert a raw ADC count to volts: `value / (2^resolution - 1) * max_voltage`
pub fn convert_units_to_volts(value: f64, adc_resolution: u32, max_voltage: f64) -> f64 {
    let max_value = (2.0_f64).powi(adc_resolution as i32) - 1.0;
    value / max_value * max_voltage
}
