// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tracing::{debug, info};

use super::context::ProvisioningContext;
use crate::developer::DeviceRegistration;
use crate::error::Result;

/// Register the target device with the team unless it already is.
pub async fn ensure_device(ctx: &ProvisioningContext) -> Result<()> {
    let devices = ctx.services.list_devices().await?;
    if devices.iter().any(|device| device.udid == ctx.device.udid) {
        debug!(udid = %ctx.device.udid, "Device already registered");
        return Ok(());
    }

    match ctx
        .services
        .register_device(&ctx.device.name, &ctx.device.udid)
        .await?
    {
        DeviceRegistration::Created(device) => {
            info!(udid = %device.udid, id = %device.id, "Registered device");
        }
        DeviceRegistration::AlreadyRegistered => {
            debug!(udid = %ctx.device.udid, "Device registered concurrently");
        }
    }
    Ok(())
}
