//! Container runtime environments.
//!
//! Renders a groovy fork-environment script that wraps a task's process in
//! a docker, podman or singularity container on the worker node.

use serde::{Deserialize, Serialize};

use crate::model::language::ScriptLanguage;
use crate::model::script::{ForkEnvironment, Script};

const RUNTIME_ENV_TEMPLATE: &str = r#"import org.ow2.proactive.utils.OperatingSystem

def VERBOSE = ${VERBOSE}
def CONTAINER_PLATFORM = "${CONTAINER_PLATFORM}"
def CONTAINER_IMAGE = "${CONTAINER_IMAGE}"
def CONTAINER_GPU_ENABLED = ${CONTAINER_GPU_ENABLED}
def HOST_MOUNT_PATH = ${HOST_MOUNT_PATH}
def CONTAINER_MOUNT_PATH = ${CONTAINER_MOUNT_PATH}
def CONTAINER_ROOTLESS_ENABLED = ${CONTAINER_ROOTLESS_ENABLED}
def CONTAINER_ISOLATION_ENABLED = ${CONTAINER_ISOLATION_ENABLED}
def CONTAINER_NO_HOME_ENABLED = ${CONTAINER_NO_HOME_ENABLED}
def CONTAINER_HOST_NETWORK_ENABLED = ${CONTAINER_HOST_NETWORK_ENABLED}

def SUPPORTED_PLATFORMS = ["docker", "podman", "singularity"]
def CONTAINER_ENABLED = SUPPORTED_PLATFORMS.any { it.equalsIgnoreCase(CONTAINER_PLATFORM) }

def cudaHome = System.getenv('CUDA_HOME') ?: "/usr/local/cuda"
if (!(new File(cudaHome)).isDirectory()) {
    CONTAINER_GPU_ENABLED = false
}

if (CONTAINER_ENABLED) {
    try {
        def proc = (CONTAINER_PLATFORM + ' --help').execute()
        proc.consumeProcessOutput(new StringBuffer(), new StringBuffer())
        proc.waitForOrKill(10000)
    } catch (Exception e) {
        println CONTAINER_PLATFORM + " is not available: " + e.getMessage()
        CONTAINER_ENABLED = false
    }
}

if (CONTAINER_ENABLED) {
    def cmd = []
    if (CONTAINER_PLATFORM.equalsIgnoreCase("singularity")) {
        cmd.add("singularity")
        cmd.add("exec")
        if (CONTAINER_GPU_ENABLED) {
            cmd.add("--nv")
        }
        if (CONTAINER_NO_HOME_ENABLED) {
            cmd.add("--no-home")
        }
        if (CONTAINER_ISOLATION_ENABLED) {
            cmd.add("--contain")
        }
        if (HOST_MOUNT_PATH && CONTAINER_MOUNT_PATH) {
            cmd.add("-B")
            cmd.add(HOST_MOUNT_PATH + ":" + CONTAINER_MOUNT_PATH)
        }
        cmd.add("-B")
        cmd.add(localspace + ":" + localspace)
        cmd.add("--pwd")
        cmd.add(localspace)
        cmd.add(CONTAINER_IMAGE)
    } else {
        cmd.add(CONTAINER_PLATFORM)
        cmd.add("run")
        cmd.add("--rm")
        if (CONTAINER_HOST_NETWORK_ENABLED) {
            cmd.add("--network=host")
        }
        if (CONTAINER_GPU_ENABLED) {
            cmd.add("--gpus=all")
        }
        if (!CONTAINER_ROOTLESS_ENABLED && !OperatingSystem.getOperatingSystem().isWindows()) {
            cmd.add("--user=" + ["id", "-u"].execute().text.trim())
        }
        if (HOST_MOUNT_PATH && CONTAINER_MOUNT_PATH) {
            cmd.add("-v")
            cmd.add(HOST_MOUNT_PATH + ":" + CONTAINER_MOUNT_PATH)
        }
        cmd.add("-v")
        cmd.add(localspace + ":" + localspace)
        cmd.add("-w")
        cmd.add(localspace)
        cmd.add(CONTAINER_IMAGE)
    }
    forkEnvironment.setPreJavaCommand(cmd)
    if (VERBOSE) {
        println "CONTAINER COMMAND : " + forkEnvironment.getPreJavaCommand()
    }
} else if (VERBOSE) {
    println "Fork environment disabled"
}
"#;

/// Container engines the rendered script knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerPlatform {
    #[default]
    Docker,
    Podman,
    Singularity,
}

impl std::fmt::Display for ContainerPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerPlatform::Docker => write!(f, "docker"),
            ContainerPlatform::Podman => write!(f, "podman"),
            ContainerPlatform::Singularity => write!(f, "singularity"),
        }
    }
}

/// Settings for running a task inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRuntime {
    pub platform: ContainerPlatform,
    pub image: String,
    pub gpu: bool,
    pub mount_host_path: Option<String>,
    pub mount_container_path: Option<String>,
    pub rootless: bool,
    pub isolation: bool,
    pub no_home: bool,
    pub host_network: bool,
    pub verbose: bool,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self {
            platform: ContainerPlatform::Docker,
            image: "docker://activeeon/dlm3".to_string(),
            gpu: false,
            mount_host_path: None,
            mount_container_path: None,
            rootless: false,
            isolation: false,
            no_home: false,
            host_network: true,
            verbose: false,
        }
    }
}

/// Escapes `value` for use between double quotes in groovy.
fn groovy_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn groovy_string_or_null(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("\"{}\"", groovy_escape(v)),
        None => "null".to_string(),
    }
}

impl ContainerRuntime {
    pub fn new(platform: ContainerPlatform, image: impl Into<String>) -> Self {
        Self {
            platform,
            image: image.into(),
            ..Self::default()
        }
    }

    /// The groovy fork-environment script for these settings.
    pub fn render(&self) -> String {
        let params: [(&str, String); 10] = [
            ("VERBOSE", self.verbose.to_string()),
            ("CONTAINER_PLATFORM", self.platform.to_string()),
            ("CONTAINER_IMAGE", groovy_escape(&self.image)),
            ("CONTAINER_GPU_ENABLED", self.gpu.to_string()),
            ("HOST_MOUNT_PATH", groovy_string_or_null(&self.mount_host_path)),
            (
                "CONTAINER_MOUNT_PATH",
                groovy_string_or_null(&self.mount_container_path),
            ),
            ("CONTAINER_ROOTLESS_ENABLED", self.rootless.to_string()),
            ("CONTAINER_ISOLATION_ENABLED", self.isolation.to_string()),
            ("CONTAINER_NO_HOME_ENABLED", self.no_home.to_string()),
            ("CONTAINER_HOST_NETWORK_ENABLED", self.host_network.to_string()),
        ];
        params
            .iter()
            .fold(RUNTIME_ENV_TEMPLATE.to_string(), |script, (key, value)| {
                script.replace(&format!("${{{}}}", key), value)
            })
    }

    pub fn into_fork_environment(self) -> ForkEnvironment {
        ForkEnvironment::new(Script::inline(ScriptLanguage::groovy(), self.render()))
    }
}
