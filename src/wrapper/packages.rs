//! Builds the OS package-manager install command line for a pool's
//! `packageReferences`. All references on one pool must share a single
//! package-manager type; `applicationPackage` is a recognized kind that
//! this crate does not know how to install.

use crate::error::{Error, Result};
use crate::model::{OsFlavor, PackageKind, PackageReference, SetupCommandFragment};

fn mixed_type_error() -> Error {
    Error::Validation("PackageReferences may only contain a single type of package reference.".into())
}

/// Builds the single OS-specific command line that installs every
/// reference in `references`, or `None` if there are none.
///
/// TODO: apt's `repository`, `keyUrl` and `sourceLine` fields are accepted
/// upstream but never wired into the install command here.
/// TODO: an `rpmRepository` field (`rpm -Uvh <rpmRepository>`) is likewise
/// not implemented for apt or yum references.
pub fn installation_command_line(references: &[PackageReference], os: OsFlavor) -> Result<Option<SetupCommandFragment>> {
    if references.is_empty() {
        return Ok(None);
    }

    let mut package_type: Option<PackageKind> = None;
    let mut builder = String::new();

    for reference in references {
        if let Some(existing) = package_type {
            if existing != reference.kind {
                return Err(mixed_type_error());
            }
        }
        match reference.kind {
            PackageKind::Apt => {
                if os != OsFlavor::Linux {
                    return Err(Error::Validation("aptPackage is only supported when targeting Linux pools".into()));
                }
                package_type = Some(PackageKind::Apt);
                let suffix = reference.version.as_ref().map(|v| format!("={v}")).unwrap_or_default();
                let cmd = format!("apt-get install -y {}{}", reference.id, suffix);
                append_joined(&mut builder, &cmd, ";");
            }
            PackageKind::Chocolatey => {
                if os != OsFlavor::Windows {
                    return Err(Error::Validation("chocolateyPackage is only supported when targeting Windows pools".into()));
                }
                package_type = Some(PackageKind::Chocolatey);
                let mut choco_cmd = String::new();
                if reference.allow_empty_checksums {
                    choco_cmd = " --allow-empty-checksums".to_string();
                }
                if let Some(v) = &reference.version {
                    choco_cmd = format!(" --version {v}{choco_cmd}");
                }
                let cmd = format!("choco install {}{}", reference.id, choco_cmd);
                append_joined(&mut builder, &cmd, " & ");
            }
            PackageKind::Yum => {
                if os != OsFlavor::Linux {
                    return Err(Error::Validation("yumPackage is only supported when targeting Linux pools".into()));
                }
                package_type = Some(PackageKind::Yum);
                let mut yum_cmd = String::new();
                if let Some(d) = &reference.disable_excludes {
                    yum_cmd = format!(" --disableexcludes={d}");
                }
                if let Some(v) = &reference.version {
                    yum_cmd = format!("-{v}{yum_cmd}");
                }
                let cmd = format!("yum -y install {}{}", reference.id, yum_cmd);
                append_joined(&mut builder, &cmd, ";");
            }
            PackageKind::Application => {
                return Err(Error::Unsupported(format!(
                    "applicationPackage (id '{}') is not a supported package reference type",
                    reference.id
                )));
            }
        }
    }

    let (cmd_line, is_windows) = match package_type {
        Some(PackageKind::Apt) => (format!("apt-get update;{builder}"), false),
        Some(PackageKind::Chocolatey) => {
            let bootstrap = "powershell -NoProfile -ExecutionPolicy unrestricted -Command \"(iex ((new-object net.webclient).DownloadString('https://chocolatey.org/install.ps1')))\" && SET PATH=\"%PATH%;%ALLUSERSPROFILE%\\chocolatey\\bin\"";
            (format!("{bootstrap} && choco feature enable -n=allowGlobalConfirmation & {builder}"), true)
        }
        Some(PackageKind::Yum) => (builder, false),
        Some(PackageKind::Application) | None => unreachable!("applicationPackage returns earlier"),
    };

    Ok(Some(SetupCommandFragment {
        cmd_line,
        is_windows,
        resource_files: vec![],
    }))
}

fn append_joined(builder: &mut String, cmd: &str, separator: &str) {
    if builder.is_empty() {
        builder.push_str(cmd);
    } else {
        builder.push_str(separator);
        builder.push_str(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(kind: PackageKind, id: &str, version: Option<&str>) -> PackageReference {
        PackageReference {
            kind,
            id: id.to_string(),
            version: version.map(String::from),
            allow_empty_checksums: false,
            disable_excludes: None,
        }
    }

    #[test]
    fn apt_packages_joined_with_semicolon() {
        let refs = vec![
            reference(PackageKind::Apt, "curl", None),
            reference(PackageKind::Apt, "git", Some("1:2.1")),
        ];
        let fragment = installation_command_line(&refs, OsFlavor::Linux).unwrap().unwrap();
        assert_eq!(fragment.cmd_line, "apt-get update;apt-get install -y curl;apt-get install -y git=1:2.1");
        assert!(!fragment.is_windows);
    }

    #[test]
    fn choco_packages_joined_with_ampersand() {
        let refs = vec![reference(PackageKind::Chocolatey, "7zip", Some("19.0"))];
        let fragment = installation_command_line(&refs, OsFlavor::Windows).unwrap().unwrap();
        assert!(fragment.cmd_line.ends_with("& choco install 7zip --version 19.0"));
        assert!(fragment.is_windows);
    }

    #[test]
    fn yum_version_prefixes_disable_excludes() {
        let mut r = reference(PackageKind::Yum, "nginx", Some("1.0"));
        r.disable_excludes = Some("updates".into());
        let fragment = installation_command_line(&[r], OsFlavor::Linux).unwrap().unwrap();
        assert_eq!(fragment.cmd_line, "yum -y install nginx-1.0 --disableexcludes=updates");
    }

    #[test]
    fn mixed_types_are_rejected() {
        let refs = vec![
            reference(PackageKind::Apt, "curl", None),
            reference(PackageKind::Yum, "curl", None),
        ];
        assert!(installation_command_line(&refs, OsFlavor::Linux).is_err());
    }

    #[test]
    fn apt_on_windows_pool_is_rejected() {
        let refs = vec![reference(PackageKind::Apt, "curl", None)];
        assert!(installation_command_line(&refs, OsFlavor::Windows).is_err());
    }

    #[test]
    fn application_package_is_unsupported() {
        let refs = vec![reference(PackageKind::Application, "myapp", None)];
        let err = installation_command_line(&refs, OsFlavor::Linux).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
