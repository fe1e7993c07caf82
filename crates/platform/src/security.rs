//! Live security posture probes
//!
//! Everything here is computed fresh per invocation; the operator flips
//! these switches between runs, so nothing may be cached.

use std::path::Path;

use rootpatch_errors::Error;
use rootpatch_types::{HardwareProfile, MacosRelease, OsVersion, SecurityState};

use crate::process::{ToolCommand, ToolRunner};

/// csr-active-config bits that must be set before a pre-snapshot root
/// volume can be patched (untrusted kexts + unrestricted filesystem).
pub const SIP_PATCH_MASK_LEGACY: u32 = 0x603;

/// Snapshot-era mask: additionally needs the unauthenticated-root bit so a
/// modified snapshot stays bootable.
pub const SIP_PATCH_MASK_SNAPSHOT: u32 = 0xA03;

/// NVRAM GUID under which the secure-boot hardware model is published.
pub const SECURE_BOOT_GUID: &str = "94B73556-2197-4702-82A8-3E1337DAFBFB";

/// Known secure-boot hardware model values. A reported model on this list
/// means full secure boot is active and root patches will not boot.
const SECURE_BOOT_MODELS: [&str; 17] = [
    "j137", "j680", "j132", "j174", "j140k", "j780", "j213", "j140a", "j152f", "j160", "j230k",
    "j214k", "j223", "j215", "j185", "j185f", "x86legacy",
];

/// Files another root patcher leaves behind. Both present means the volume
/// was already modified by a different tool and ours must refuse it.
const FOREIGN_PATCHER_MARKERS: [&str; 2] = [
    "System/Library/Extensions/AppleIntelHDGraphics.kext",
    "System/Library/Extensions/AppleIntelHD3000Graphics.kext",
];

/// Probe the live security posture.
///
/// `system_root` is `/` in production; tests point it at a sandbox.
pub async fn probe_security_state(
    runner: &dyn ToolRunner,
    os: &OsVersion,
    profile: &HardwareProfile,
    system_root: &Path,
) -> Result<SecurityState, Error> {
    let csr = read_csr_active_config(runner).await?;
    let required = if os.release.uses_snapshots() {
        SIP_PATCH_MASK_SNAPSHOT
    } else {
        SIP_PATCH_MASK_LEGACY
    };
    let sip_enabled = (csr & required) != required;

    let secure_boot_enabled = read_secure_boot_model(runner).await?;

    // Catalina and older can disable library validation per-binary, so AMFI
    // never blocks there.
    let amfi_enabled = if os.release > MacosRelease::Catalina {
        !(profile.boot_args.contains("amfi_get_out_of_my_way=1")
            || profile.boot_args.contains("amfi_get_out_of_my_way=0x1"))
    } else {
        false
    };

    let filevault_enabled = if os.release > MacosRelease::Catalina {
        let output = runner
            .run(ToolCommand::new("fdesetup").arg("status"))
            .await?;
        !output.stdout.contains("FileVault is Off")
    } else {
        false
    };

    let foreign_patcher_detected = FOREIGN_PATCHER_MARKERS
        .iter()
        .all(|marker| runner.path_exists(&system_root.join(marker)));

    Ok(SecurityState {
        sip_enabled,
        secure_boot_enabled,
        amfi_enabled,
        filevault_enabled,
        foreign_patcher_detected,
        board_id: profile.board_id.clone(),
    })
}

/// Read `csr-active-config` from NVRAM. A missing variable means SIP was
/// never lowered, i.e. all bits clear.
async fn read_csr_active_config(runner: &dyn ToolRunner) -> Result<u32, Error> {
    let output = runner
        .run(ToolCommand::new("nvram").arg("csr-active-config"))
        .await?;
    if !output.success() {
        return Ok(0);
    }
    Ok(parse_nvram_u32(&output.stdout))
}

async fn read_secure_boot_model(runner: &dyn ToolRunner) -> Result<bool, Error> {
    let output = runner
        .run(ToolCommand::new("nvram").arg(format!("{SECURE_BOOT_GUID}:HardwareModel")))
        .await?;
    if !output.success() {
        return Ok(false);
    }
    let value = output.stdout.to_ascii_lowercase();
    Ok(SECURE_BOOT_MODELS.iter().any(|model| value.contains(model)))
}

/// Parse `nvram` output like `csr-active-config\t%03%0a%00%00` into a
/// little-endian u32. Unescaped bytes appear literally; `%xx` pairs are
/// percent-encoded.
fn parse_nvram_u32(raw: &str) -> u32 {
    let Some(value) = raw.split_once(char::is_whitespace).map(|(_, v)| v) else {
        return 0;
    };
    let mut bytes = Vec::with_capacity(4);
    let mut chars = value.trim_end().chars();
    while let Some(c) = chars.next() {
        if bytes.len() == 4 {
            break;
        }
        if c == '%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let pair = [hi, lo].iter().collect::<String>();
                if let Ok(byte) = u8::from_str_radix(&pair, 16) {
                    bytes.push(byte);
                }
            }
        } else if c.is_ascii() {
            bytes.push(c as u8);
        }
    }
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().enumerate().take(4) {
        value |= u32::from(*byte) << (8 * i);
    }
    value
}
