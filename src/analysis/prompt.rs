//! Prompt text for the drying-optimization model

use super::AnalysisInput;

const SYSTEM_MESSAGE: &str = "You are an agricultural drying optimization assistant.

Based on these live readings and optimal conditions, provide:
- 5 actionable optimization tips to improve drying efficiency, avoid spoilage, and maintain product quality.
- The estimated moisture content value ONLY.
- The optimal drying time range";

const FORMAT_INSTRUCTIONS: &str = r#"The output must be a JSON object with exactly these keys:
{"recommendations": [string, ...], "estimated_moisture_content": string, "optimal_drying_time_range": string}"#;

/// A rendered system + user message pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn render(input: &AnalysisInput) -> Self {
        let request = &input.request;
        let profile = &input.profile;
        let reading = &input.snapshot.reading;

        let user = format!(
            "Here's the drying setup:
- Crop: {crop}
- Initial moisture content of crop: {initial}
- Target moisture content of crop: {target}
- Recommended moisture content of crop: {recommended} %
- Dryer Type: {dryer}
- Optimal Air Temperature Range: {temp_range}°C
- Optimal Air Velocity Range: {velocity_range} m/s
- Typical Drying Time Range: {time_range} hours
- Critical Temperature: {critical}°C
- Notes: Avoid overheating to maintain flavour

Here are the live readings:
- Temperature: {temperature}°C
- Relative Humidity: {humidity}%
- Air Velocity: {velocity} m/s
- Drying Time Elapsed: {elapsed:.2} hours

{format}

Respond ONLY with valid JSON.",
            crop = request.crop,
            initial = request.initial_moisture_content,
            target = request.final_moisture_content,
            recommended = profile.recommended_moisture_content,
            dryer = request.dryer,
            temp_range = profile.optimal_temp_range,
            velocity_range = profile.optimal_velocity_range,
            time_range = profile.optimal_drying_time_range,
            critical = profile.critical_temp,
            temperature = reading.temperature,
            humidity = reading.humidity,
            velocity = reading.vibration,
            elapsed = input.drying_time_elapsed_hours(),
            format = FORMAT_INSTRUCTIONS,
        );

        Self {
            system: SYSTEM_MESSAGE.to_string(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::tests::sample_input;

    #[test]
    fn test_prompt_includes_setup_and_readings() {
        let prompt = sample_input().render_prompt();

        assert!(prompt.system.starts_with("You are an agricultural drying"));
        assert!(prompt.user.contains("- Crop: maize"));
        assert!(prompt.user.contains("- Dryer Type: solar cabinet"));
        assert!(prompt.user.contains("- Temperature: 58°C"));
        assert!(prompt.user.contains("- Relative Humidity: 35%"));
        assert!(prompt.user.contains("- Air Velocity: 1.4 m/s"));
        assert!(prompt.user.contains("- Drying Time Elapsed: 3.00 hours"));
        assert!(prompt.user.contains("- Critical Temperature: 70°C"));
        assert!(prompt.user.ends_with("Respond ONLY with valid JSON."));
    }
}
