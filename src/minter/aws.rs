//! `IotControlPlane` backed by the AWS SDK (IoT + STS)

use async_trait::async_trait;
use aws_sdk_iot::config::{Credentials, Region};
use aws_sdk_iot::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iot::types::ThingTypeProperties;

use super::{ControlPlaneError, EndpointKind, IotControlPlane, IssuedCertificate, StaticCredentials};

const ALREADY_EXISTS_CODE: &str = "ResourceAlreadyExistsException";

pub struct AwsControlPlane {
    iot: aws_sdk_iot::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsControlPlane {
    pub async fn connect(credentials: &StaticCredentials) -> Self {
        let provider = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            "gg-provision",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        log::debug!("AWS clients configured for {}", credentials.region);
        Self {
            iot: aws_sdk_iot::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
        }
    }
}

/// Map an SDK failure, singling out the "already exists" error code
fn classify<E, R>(operation: &'static str, resource: &str, err: SdkError<E, R>) -> ControlPlaneError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if err.code() == Some(ALREADY_EXISTS_CODE) {
        return ControlPlaneError::AlreadyExists {
            operation,
            resource: resource.to_string(),
        };
    }
    ControlPlaneError::Api {
        operation,
        message: DisplayErrorContext(&err).to_string(),
    }
}

fn missing_field(operation: &'static str, field: &str) -> ControlPlaneError {
    ControlPlaneError::Api {
        operation,
        message: format!("response did not include {field}"),
    }
}

#[async_trait]
impl IotControlPlane for AwsControlPlane {
    async fn caller_account(&self) -> Result<String, ControlPlaneError> {
        const OP: &str = "GetCallerIdentity";
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ControlPlaneError::Api {
                operation: OP,
                message: DisplayErrorContext(&e).to_string(),
            })?;
        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| missing_field(OP, "Account"))
    }

    async fn describe_endpoint(&self, kind: EndpointKind) -> Result<String, ControlPlaneError> {
        const OP: &str = "DescribeEndpoint";
        let output = self
            .iot
            .describe_endpoint()
            .endpoint_type(kind.as_str())
            .send()
            .await
            .map_err(|e| classify(OP, kind.as_str(), e))?;
        output
            .endpoint_address()
            .map(str::to_string)
            .ok_or_else(|| missing_field(OP, "endpointAddress"))
    }

    async fn create_thing_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), ControlPlaneError> {
        let properties = ThingTypeProperties::builder()
            .thing_type_description(description)
            .build();
        self.iot
            .create_thing_type()
            .thing_type_name(name)
            .thing_type_properties(properties)
            .send()
            .await
            .map_err(|e| classify("CreateThingType", &format!("IoT thing type '{name}'"), e))?;
        log::info!("Created IoT thing type: {name}");
        Ok(())
    }

    async fn create_thing(&self, name: &str, thing_type: &str) -> Result<(), ControlPlaneError> {
        self.iot
            .create_thing()
            .thing_name(name)
            .thing_type_name(thing_type)
            .send()
            .await
            .map_err(|e| classify("CreateThing", &format!("IoT thing '{name}'"), e))?;
        log::info!("Created IoT thing: {name}");
        Ok(())
    }

    async fn create_keys_and_certificate(&self) -> Result<IssuedCertificate, ControlPlaneError> {
        const OP: &str = "CreateKeysAndCertificate";
        let output = self
            .iot
            .create_keys_and_certificate()
            .set_as_active(true)
            .send()
            .await
            .map_err(|e| classify(OP, "certificate", e))?;

        let field = |value: Option<&str>, name: &str| {
            value
                .map(str::to_string)
                .ok_or_else(|| missing_field(OP, name))
        };
        Ok(IssuedCertificate {
            arn: field(output.certificate_arn(), "certificateArn")?,
            id: field(output.certificate_id(), "certificateId")?,
            pem: field(output.certificate_pem(), "certificatePem")?,
            private_key: field(
                output.key_pair().and_then(|kp| kp.private_key()),
                "keyPair.PrivateKey",
            )?,
        })
    }

    async fn attach_thing_principal(
        &self,
        thing_name: &str,
        principal: &str,
    ) -> Result<(), ControlPlaneError> {
        self.iot
            .attach_thing_principal()
            .thing_name(thing_name)
            .principal(principal)
            .send()
            .await
            .map_err(|e| classify("AttachThingPrincipal", principal, e))?;
        Ok(())
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<(), ControlPlaneError> {
        self.iot
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| classify("CreatePolicy", &format!("IoT policy '{name}'"), e))?;
        log::info!("Created IoT policy: {name}");
        Ok(())
    }

    async fn attach_policy(&self, name: &str, target: &str) -> Result<(), ControlPlaneError> {
        self.iot
            .attach_policy()
            .policy_name(name)
            .target(target)
            .send()
            .await
            .map_err(|e| classify("AttachPolicy", name, e))?;
        Ok(())
    }
}
