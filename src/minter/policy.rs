//! IoT policy document for a Greengrass core device

use serde_json::{Value, json};

/// Policy allowing MQTT connect/publish/subscribe/receive, the full
/// `greengrass:*` namespace, and certificate-based role assumption through
/// `role_alias` in the given account and region.
pub fn greengrass_core_policy(region: &str, account_id: &str, role_alias: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "iot:Connect",
                    "iot:Publish",
                    "iot:Subscribe",
                    "iot:Receive"
                ],
                "Resource": "*"
            },
            {
                "Effect": "Allow",
                "Action": ["greengrass:*"],
                "Resource": "*"
            },
            {
                "Effect": "Allow",
                "Action": ["iot:AssumeRoleWithCertificate"],
                "Resource": [
                    format!("arn:aws:iot:{region}:{account_id}:rolealias/{role_alias}")
                ]
            }
        ]
    })
}
