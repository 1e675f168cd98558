use crate::attendance::mac;
use crate::collector::scan::IdentifierSource;
use crate::discovery::DiscoveredDevice;
use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};

pub fn prompt_mac_address(theme: &ColorfulTheme) -> Result<String> {
    Input::with_theme(theme)
        .with_prompt("Enter the MAC address of the device")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            mac::validate(input).map(|_| ()).map_err(|error| error.to_string())
        })
        .interact_text()
        .context("Failed to read MAC address")
}

pub fn prompt_identifier(theme: &ColorfulTheme, mac_address: &str) -> Result<String> {
    Input::with_theme(theme)
        .with_prompt(format!("Enter the enrollment number for MAC address {mac_address}"))
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("Enrollment number must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map(|value: String| value.trim().to_string())
        .context("Failed to read enrollment number")
}

#[derive(Default)]
pub struct TerminalIdentifiers {
    theme: ColorfulTheme,
}

impl IdentifierSource for TerminalIdentifiers {
    fn identifier_for(&mut self, device: &DiscoveredDevice) -> Result<Option<String>> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(format!(
                "Enrollment number for {} ({}) [blank to skip]",
                device.mac, device.ip
            ))
            .allow_empty(true)
            .interact_text()
            .context("Failed to read enrollment number")?;

        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}
