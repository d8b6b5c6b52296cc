pub mod backfill;
pub mod client;

pub use backfill::*;
pub use client::*;

#[cfg(test)]
mod tests {
    use super::*;
    use aw_models::Settings;

    #[test]
    fn test_client_requires_both_keys() {
        let mut settings = Settings::default();
        settings.aw_api_key = Some("api".to_string());
        let err = AmbientClient::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("API key and application key must be specified"));

        settings.aw_application_key = Some("app".to_string());
        assert!(AmbientClient::from_settings(&settings).is_ok());
    }

    #[test]
    fn test_device_deserializes_from_api_shape() {
        let json = r#"{"macAddress": "AA:BB", "info": {"name": "Backyard"}, "lastData": {"tempf": 70.1}}"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.mac_address, "AA:BB");
        assert_eq!(device.info.unwrap()["name"], "Backyard");
    }
}
