//! The aptly API service
//!
//! The service is controlled through the init system as root. Its unit file
//! is a separate managed-file resource; when that file changes the service
//! is restarted through the refresh command.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

use super::{CONFIG_FILE_ID, PACKAGE_ID, Pattern, PlannerConfig, Strategy};
use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};

pub const SERVICE_NAME: &str = "aptly-api";

const ENSURE: &[&str] = &["stopped", "running"];
const LOG: &[&str] = &["none", "log"];
const INIT_SYSTEMS: &[&str] = &["systemd", "upstart"];
const LISTEN_PATTERN: &str = r"^(\d{1,3}(\.\d{1,3}){3})?:\d{1,5}$";

static LISTEN: Pattern = LazyLock::new(|| Regex::new(LISTEN_PATTERN));

pub(super) const STRATEGY: Strategy = Strategy {
    accepts: &[
        "ensure",
        "listen",
        "log",
        "user",
        "group",
        "enable_cli_and_http",
        "init_system",
    ],
    validate,
    apply,
    probe,
    refresh,
    run_as: root,
    dependencies,
    describe,
    parallel: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Init {
    Systemd,
    Upstart,
}

/// API settings with defaults applied
struct Settings<'a> {
    running: bool,
    listen: &'a str,
    log: &'a str,
    user: &'a str,
    group: &'a str,
    no_lock: bool,
    init: Init,
}

impl<'a> Settings<'a> {
    fn of(descriptor: &'a ResourceDescriptor) -> Self {
        let attrs = &descriptor.attributes;
        Self {
            running: attrs.ensure.as_deref() != Some("stopped"),
            listen: attrs.listen.as_deref().unwrap_or(":8080"),
            log: attrs.log.as_deref().unwrap_or("none"),
            user: attrs.user.as_deref().unwrap_or("root"),
            group: attrs.group.as_deref().unwrap_or("root"),
            no_lock: attrs.enable_cli_and_http.unwrap_or(false),
            init: match attrs.init_system.as_deref() {
                Some("upstart") => Init::Upstart,
                _ => Init::Systemd,
            },
        }
    }

    fn exec(&self, aptly_bin: &str) -> String {
        let no_lock = if self.no_lock { " -no-lock" } else { "" };
        format!("{aptly_bin} api serve -listen={}{no_lock}", self.listen)
    }
}

fn validate(descriptor: &ResourceDescriptor, _config: &PlannerConfig) -> Result<()> {
    let attrs = &descriptor.attributes;

    super::check_one_of(descriptor, "ensure", attrs.ensure.as_deref(), ENSURE)?;
    super::check_one_of(descriptor, "log", attrs.log.as_deref(), LOG)?;
    super::check_one_of(descriptor, "init_system", attrs.init_system.as_deref(), INIT_SYSTEMS)?;

    if let Some(listen) = attrs.listen.as_deref()
        && !super::compiled(&LISTEN)?.is_match(listen)
    {
        return Err(Error::validation(
            descriptor.id(),
            "listen",
            "Valid values for listen: :port, <ip>:<port>",
        ));
    }

    for (attribute, value) in [("user", &attrs.user), ("group", &attrs.group)] {
        if let Some(value) = value {
            super::check_name(descriptor, attribute, value)?;
        }
    }

    Ok(())
}

fn probe(descriptor: &ResourceDescriptor, _config: &PlannerConfig) -> String {
    let settings = Settings::of(descriptor);
    match (settings.init, settings.running) {
        (Init::Systemd, true) => format!(
            "systemctl is-active --quiet {SERVICE_NAME} && systemctl is-enabled --quiet {SERVICE_NAME}"
        ),
        (Init::Systemd, false) => format!("! systemctl is-active --quiet {SERVICE_NAME}"),
        (Init::Upstart, true) => {
            format!("status {SERVICE_NAME} 2>/dev/null | grep -q 'start/running'")
        }
        (Init::Upstart, false) => {
            format!("! status {SERVICE_NAME} 2>/dev/null | grep -q 'start/running'")
        }
    }
}

fn apply(descriptor: &ResourceDescriptor, _config: &PlannerConfig) -> String {
    let settings = Settings::of(descriptor);
    match (settings.init, settings.running) {
        (Init::Systemd, true) => {
            format!("systemctl daemon-reload && systemctl enable --now {SERVICE_NAME}")
        }
        (Init::Systemd, false) => format!("systemctl stop {SERVICE_NAME}"),
        (Init::Upstart, true) => format!("start {SERVICE_NAME}"),
        (Init::Upstart, false) => format!("stop {SERVICE_NAME}"),
    }
}

fn refresh(descriptor: &ResourceDescriptor) -> Option<String> {
    let settings = Settings::of(descriptor);
    if !settings.running {
        return None;
    }
    Some(match settings.init {
        Init::Systemd => {
            format!("systemctl daemon-reload && systemctl restart {SERVICE_NAME}")
        }
        Init::Upstart => format!("restart {SERVICE_NAME} || start {SERVICE_NAME}"),
    })
}

fn root(_config: &PlannerConfig) -> String {
    "root".to_string()
}

fn dependencies(_descriptor: &ResourceDescriptor) -> Vec<String> {
    vec![
        PACKAGE_ID.to_string(),
        CONFIG_FILE_ID.to_string(),
        unit_id(),
    ]
}

fn describe(descriptor: &ResourceDescriptor) -> String {
    if Settings::of(descriptor).running {
        format!("Ensure {SERVICE_NAME} is running")
    } else {
        format!("Ensure {SERVICE_NAME} is stopped")
    }
}

fn unit_id() -> String {
    format!("unit.{SERVICE_NAME}")
}

/// Init-system job definition for the API service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    pub id: String,
    pub path: PathBuf,
    pub content: String,
}

/// Render the unit file for a validated API descriptor
pub fn unit_file(descriptor: &ResourceDescriptor, config: &PlannerConfig) -> UnitFile {
    let settings = Settings::of(descriptor);
    let exec = settings.exec(&config.aptly_bin);

    let (path, content) = match settings.init {
        Init::Systemd => (
            format!("/etc/systemd/system/{SERVICE_NAME}.service"),
            format!(
                "[Unit]\n\
                 Description=Aptly API server\n\
                 After=network.target\n\
                 \n\
                 [Service]\n\
                 Type=simple\n\
                 User={}\n\
                 Group={}\n\
                 ExecStart={exec}\n\
                 Restart=on-failure\n\
                 \n\
                 [Install]\n\
                 WantedBy=multi-user.target\n",
                settings.user, settings.group
            ),
        ),
        Init::Upstart => (
            format!("/etc/init/{SERVICE_NAME}.conf"),
            format!(
                "description \"Aptly API server\"\n\
                 \n\
                 start on runlevel [2345]\n\
                 stop on runlevel [!2345]\n\
                 respawn\n\
                 \n\
                 setuid {}\n\
                 setgid {}\n\
                 console {}\n\
                 \n\
                 exec {exec}\n",
                settings.user, settings.group, settings.log
            ),
        ),
    };

    UnitFile {
        id: unit_id(),
        path: PathBuf::from(path),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Attributes, ResourceKind};
    use crate::planner::plan;

    fn api(attributes: Attributes) -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::ApiService, SERVICE_NAME, attributes)
    }

    fn lines(content: &str) -> Vec<&str> {
        content.lines().collect()
    }

    #[test]
    fn systemd_defaults() {
        let d = api(Attributes::default());
        let unit = unit_file(&d, &PlannerConfig::default());

        assert_eq!(unit.path, PathBuf::from("/etc/systemd/system/aptly-api.service"));
        let content = lines(&unit.content);
        assert!(content.contains(&"User=root"));
        assert!(content.contains(&"Group=root"));
        assert!(content.contains(&"ExecStart=/usr/bin/aptly api serve -listen=:8080"));

        let spec = plan(&d, &PlannerConfig::default()).unwrap();
        assert_eq!(spec.run_as_user, "root");
        assert!(spec.probe.contains("systemctl is-active --quiet aptly-api"));
        assert!(spec.apply.contains("systemctl enable --now aptly-api"));
        assert!(spec.depends_on.contains("unit.aptly-api"));
        assert_eq!(
            spec.refresh.as_deref(),
            Some("systemctl daemon-reload && systemctl restart aptly-api")
        );
    }

    #[test]
    fn api_runs_as_root_whatever_the_site_user() {
        let config = PlannerConfig {
            run_as_user: "aptly".to_string(),
            ..Default::default()
        };
        assert_eq!(plan(&api(Attributes::default()), &config).unwrap().run_as_user, "root");
    }

    #[test]
    fn custom_listen_user_group_and_no_lock() {
        let d = api(Attributes {
            listen: Some("127.0.0.1:9090".to_string()),
            user: Some("yolo".to_string()),
            group: Some("yolo".to_string()),
            enable_cli_and_http: Some(true),
            ..Default::default()
        });
        let unit = unit_file(&d, &PlannerConfig::default());
        let content = lines(&unit.content);
        assert!(content.contains(&"User=yolo"));
        assert!(content.contains(&"Group=yolo"));
        assert!(content.contains(&"ExecStart=/usr/bin/aptly api serve -listen=127.0.0.1:9090 -no-lock"));
    }

    #[test]
    fn stopped_service_has_no_refresh() {
        let spec = plan(
            &api(Attributes {
                ensure: Some("stopped".to_string()),
                ..Default::default()
            }),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert_eq!(spec.apply, "systemctl stop aptly-api");
        assert_eq!(spec.probe, "! systemctl is-active --quiet aptly-api");
        assert!(spec.refresh.is_none());
    }

    #[test]
    fn upstart_job() {
        let d = api(Attributes {
            init_system: Some("upstart".to_string()),
            log: Some("log".to_string()),
            ..Default::default()
        });
        let unit = unit_file(&d, &PlannerConfig::default());
        assert_eq!(unit.path, PathBuf::from("/etc/init/aptly-api.conf"));
        let content = lines(&unit.content);
        assert!(content.contains(&"setuid root"));
        assert!(content.contains(&"setgid root"));
        assert!(content.contains(&"console log"));
        assert!(content.contains(&"exec /usr/bin/aptly api serve -listen=:8080"));

        let spec = plan(&d, &PlannerConfig::default()).unwrap();
        assert_eq!(spec.apply, "start aptly-api");
        assert_eq!(spec.probe, "status aptly-api 2>/dev/null | grep -q 'start/running'");
        assert_eq!(
            spec.refresh.as_deref(),
            Some("restart aptly-api || start aptly-api")
        );
    }

    #[test]
    fn stopped_upstart_job() {
        let spec = plan(
            &api(Attributes {
                init_system: Some("upstart".to_string()),
                ensure: Some("stopped".to_string()),
                ..Default::default()
            }),
            &PlannerConfig::default(),
        )
        .unwrap();
        assert_eq!(spec.apply, "stop aptly-api");
        assert_eq!(spec.probe, "! status aptly-api 2>/dev/null | grep -q 'start/running'");
        assert!(spec.refresh.is_none());
        assert_eq!(spec.run_as_user, "root");
    }

    #[test]
    fn invalid_values_name_accepted_set() {
        let cases = [
            (
                Attributes { ensure: Some("yolo".into()), ..Default::default() },
                "Valid values for ensure: stopped, running",
            ),
            (
                Attributes { listen: Some("yolo".into()), ..Default::default() },
                "Valid values for listen: :port, <ip>:<port>",
            ),
            (
                Attributes { log: Some("yolo".into()), ..Default::default() },
                "Valid values for log: none, log",
            ),
        ];
        for (attributes, expected) in cases {
            let err = plan(&api(attributes), &PlannerConfig::default()).unwrap_err();
            assert!(err.to_string().contains(expected), "{err}");
        }
    }
}
