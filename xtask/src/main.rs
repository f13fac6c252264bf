use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus, Stdio};

use clap::{Parser, Subcommand, ValueEnum};
use etl_core::contract::{InvocationRequest, PipelineRoute};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Media type the function service accepts for container images.
const DOCKER_V2_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the Nuevo León finance ETL workspace",
    long_about = "Builds, packages, deploys and inspects the ETL function.\n\
                  Deployment commands shell out to the `aws` and `docker` CLIs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the function binary and zip it as `bootstrap`
    Package {
        /// Compilation target triple for the function binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Build the container image for a single architecture
    ImageBuild {
        /// Registry repository URI, e.g. <account>.dkr.ecr.<region>.amazonaws.com/etl
        #[arg(long, env = "ETL_IMAGE_REPOSITORY")]
        repository: String,
        #[arg(long, default_value = "latest")]
        tag: String,
        #[arg(value_enum, long, default_value_t = Arch::Amd64)]
        arch: Arch,
        /// Push to the registry instead of loading locally
        #[arg(long)]
        push: bool,
    },
    /// Authenticate docker against the image registry
    EcrLogin {
        /// Registry host or any image URI inside it
        #[arg(long, env = "ETL_IMAGE_REPOSITORY")]
        repository: String,
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// Point the function at a pushed image and wait for the update
    Deploy {
        #[arg(long, env = "ETL_FUNCTION_NAME")]
        function: String,
        #[arg(long, env = "ETL_IMAGE_REPOSITORY")]
        repository: String,
        #[arg(long, default_value = "latest")]
        tag: String,
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// Invoke the function with `{"pipeline": <name>}`
    Invoke {
        #[arg(long, env = "ETL_FUNCTION_NAME")]
        function: String,
        /// Pipeline route, e.g. balance_single
        #[arg(long)]
        pipeline: String,
        /// File the function response is written to
        #[arg(long, default_value = "response.json")]
        output: String,
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// Tail the function's log group
    Logs {
        #[arg(long, env = "ETL_FUNCTION_NAME")]
        function: String,
        /// Window accepted by `aws logs tail --since`
        #[arg(long, default_value = "10m")]
        since: String,
        #[arg(long)]
        follow: bool,
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// Verify a pushed image uses the docker v2 manifest media type
    ManifestCheck {
        /// Repository name inside the registry
        #[arg(long, env = "ETL_REPOSITORY_NAME")]
        repository_name: String,
        #[arg(long, default_value = "latest")]
        tag: String,
        #[arg(long, env = "AWS_REGION")]
        region: String,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    fn platform(self) -> &'static str {
        match self {
            Self::Amd64 => "linux/amd64",
            Self::Arm64 => "linux/arm64",
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn fail(message: impl AsRef<str>) -> ! {
    eprintln!("error: {}", message.as_ref());
    exit(1);
}

fn command_status(program: &str, args: &[&str]) -> ExitStatus {
    eprintln!("+ {program} {}", args.join(" "));
    Command::new(program)
        .args(args)
        .status()
        .unwrap_or_else(|error| fail(format!("failed to execute {program}: {error}")))
}

fn run(program: &str, args: &[&str]) {
    let status = command_status(program, args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_cargo(args: &[&str]) {
    run("cargo", args);
}

fn capture(program: &str, args: &[&str]) -> String {
    eprintln!("+ {program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::inherit())
        .output()
        .unwrap_or_else(|error| fail(format!("failed to execute {program}: {error}")));
    if !output.status.success() {
        exit(output.status.code().unwrap_or(1));
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn image_uri(repository: &str, tag: &str) -> String {
    format!("{repository}:{tag}")
}

fn registry_host(repository: &str) -> &str {
    repository.split('/').next().unwrap_or(repository)
}

// ── package ────────────────────────────────────────────────────────

fn package_function(target: &str, profile: BuildProfile) {
    step("Build function binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        "etl_lambda",
        "--target",
        target,
        "--bin",
        "etl_runtime",
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package function zip");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join("etl_runtime");
    let dist_dir = Path::new("dist");
    fs::create_dir_all(dist_dir)
        .unwrap_or_else(|error| fail(format!("failed to create dist directory: {error}")));
    let zip_path = dist_dir.join("etl_runtime.zip");
    if let Err(message) = package_bootstrap_zip(&binary_path, &zip_path) {
        fail(message);
    }
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn package_bootstrap_zip(binary_path: &Path, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path).map_err(|error| {
        format!(
            "expected function binary at '{}': {error}",
            binary_path.display()
        )
    })?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create {}: {error}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .map_err(|error| format!("failed to start bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish zip: {error}"))?;
    Ok(())
}

// ── image & deployment ─────────────────────────────────────────────

/// Single-arch build without attestations so the registry stores a plain
/// docker v2 manifest instead of an OCI index.
fn image_build_args(image: &str, arch: Arch, push: bool) -> Vec<String> {
    vec![
        "buildx".to_string(),
        "build".to_string(),
        "--platform".to_string(),
        arch.platform().to_string(),
        "--provenance=false".to_string(),
        "--sbom=false".to_string(),
        "--output".to_string(),
        format!("type=image,name={image},oci-mediatypes=false,push={push}"),
        "--tag".to_string(),
        image.to_string(),
        ".".to_string(),
    ]
}

fn ecr_login(repository: &str, region: &str) {
    step("Fetch registry password");
    let password = capture("aws", &["ecr", "get-login-password", "--region", region]);

    step("Docker login");
    let registry = registry_host(repository);
    eprintln!("+ docker login --username AWS --password-stdin {registry}");
    let mut child = Command::new("docker")
        .args(["login", "--username", "AWS", "--password-stdin", registry])
        .stdin(Stdio::piped())
        .spawn()
        .unwrap_or_else(|error| fail(format!("failed to execute docker: {error}")));
    if let Some(stdin) = child.stdin.as_mut() {
        if let Err(error) = stdin.write_all(password.as_bytes()) {
            fail(format!("failed to pass registry password to docker: {error}"));
        }
    }
    let status = child
        .wait()
        .unwrap_or_else(|error| fail(format!("docker login did not finish: {error}")));
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn invoke_payload(pipeline: &str) -> Result<String, String> {
    let route = PipelineRoute::parse(pipeline).map_err(|error| error.to_string())?;
    let request = InvocationRequest {
        pipeline: Some(route.as_str().to_string()),
    };
    serde_json::to_string(&request).map_err(|error| format!("failed to encode payload: {error}"))
}

fn log_group(function: &str) -> String {
    format!("/aws/lambda/{function}")
}

fn manifest_check(repository_name: &str, tag: &str, region: &str) {
    step("Read image manifest media type");
    let image_ids = format!("imageTag={tag}");
    let media_type = capture(
        "aws",
        &[
            "ecr",
            "batch-get-image",
            "--repository-name",
            repository_name,
            "--image-ids",
            &image_ids,
            "--region",
            region,
            "--query",
            "images[0].imageManifestMediaType",
            "--output",
            "text",
        ],
    );
    if media_type != DOCKER_V2_MANIFEST {
        fail(format!(
            "image {repository_name}:{tag} has manifest media type '{media_type}', expected '{DOCKER_V2_MANIFEST}'"
        ));
    }
    eprintln!("\nManifest media type OK: {media_type}");
}

// ── CI ─────────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test etl_core");
    run_cargo(&["test", "-p", "etl_core"]);

    step("Test etl_lambda");
    run_cargo(&["test", "-p", "etl_lambda"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => package_function(&target, profile),
        Commands::ImageBuild {
            repository,
            tag,
            arch,
            push,
        } => {
            step("Build container image");
            let image = image_uri(&repository, &tag);
            let args = image_build_args(&image, arch, push);
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            run("docker", &args);
        }
        Commands::EcrLogin { repository, region } => ecr_login(&repository, &region),
        Commands::Deploy {
            function,
            repository,
            tag,
            region,
        } => {
            let image = image_uri(&repository, &tag);
            step("Update function code");
            run(
                "aws",
                &[
                    "lambda",
                    "update-function-code",
                    "--function-name",
                    &function,
                    "--image-uri",
                    &image,
                    "--region",
                    &region,
                ],
            );
            step("Wait for function update");
            run(
                "aws",
                &[
                    "lambda",
                    "wait",
                    "function-updated",
                    "--function-name",
                    &function,
                    "--region",
                    &region,
                ],
            );
        }
        Commands::Invoke {
            function,
            pipeline,
            output,
            region,
        } => {
            let payload = invoke_payload(&pipeline).unwrap_or_else(|message| fail(message));
            step("Invoke function");
            run(
                "aws",
                &[
                    "lambda",
                    "invoke",
                    "--function-name",
                    &function,
                    "--cli-binary-format",
                    "raw-in-base64-out",
                    "--payload",
                    &payload,
                    "--region",
                    &region,
                    &output,
                ],
            );
            match fs::read_to_string(&output) {
                Ok(body) => eprintln!("\nResponse ({output}):\n{body}"),
                Err(error) => fail(format!("failed to read {output}: {error}")),
            }
        }
        Commands::Logs {
            function,
            since,
            follow,
            region,
        } => {
            let group = log_group(&function);
            let mut args = vec![
                "logs",
                "tail",
                group.as_str(),
                "--since",
                since.as_str(),
                "--region",
                region.as_str(),
            ];
            if follow {
                args.push("--follow");
            }
            run("aws", &args);
        }
        Commands::ManifestCheck {
            repository_name,
            tag,
            region,
        } => manifest_check(&repository_name, &tag, &region),
        Commands::Ci => {
            ci_check();
            eprintln!("\nCI job passed.");
        }
    }
}
