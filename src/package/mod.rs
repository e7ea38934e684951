// src/package/mod.rs

//! Package emission
//!
//! One [`PackageContext`] emits one `.apk`. The job runs its stages strictly
//! in order:
//!
//! ```text
//! Scanning -> DataArchiving -> ControlComposing -> [Signing] -> Combining
//! ```
//!
//! The first failing stage aborts the job with [`Error::StageFailed`]; no
//! later stage runs and nothing is written to the output directory.
//!
//! The resulting file is a concatenation of gzip members:
//!
//! ```text
//! [signature.tar.gz]  .SIGN.RSA.<key>.pub   (tar stream left open)
//! control.tar.gz      .PKGINFO              (tar stream left open)
//! data.tar.gz         package tree          (complete tar stream)
//! ```

mod combine;
mod stages;

pub use combine::{combine, publish};
pub use stages::{ControlMember, DataMember, SignatureMember};

use crate::arch::Arch;
use crate::config::{BuildContext, Package, PackageConfig, Subpackage};
use crate::error::{Error, Result, Stage};
use crate::hash::Hash;
use crate::scan::scan_installed_size;
use crate::signing::{RsaSigner, Signer, signature_name};
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Span, info, info_span};

/// Everything needed to emit one package
pub struct PackageContext {
    name: String,
    version: String,
    epoch: u64,
    description: String,
    licenses: Vec<String>,
    depends: Vec<String>,
    arch: Arch,
    workspace_subdir: PathBuf,
    out_dir: PathBuf,
    pub(crate) source_date_epoch: u64,
    temp_dir: Option<PathBuf>,
    signing: Signing,
    span: Span,
}

enum Signing {
    Unsigned,
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Signer(Arc<dyn Signer>),
}

/// Result of a successful emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedPackage {
    /// `NAME-VERSION-rEPOCH`
    pub identity: String,
    /// Published package file
    pub path: PathBuf,
    pub installed_size: u64,
    /// SHA-256 of the data member
    pub data_digest: Hash,
    /// SHA-1 of the control member
    pub control_digest: Hash,
    /// Signature entry name, when signed
    pub signature_name: Option<String>,
    /// Total file size
    pub size: u64,
}

impl PackageContext {
    /// Context for the origin package of a build
    pub fn for_package(ctx: &BuildContext, package: &Package) -> Self {
        Self::new(
            ctx,
            package,
            &package.name,
            &package.description,
            &package.dependencies.runtime,
        )
    }

    /// Context for a subpackage
    ///
    /// Version, epoch and licenses come from the origin package; the
    /// description and runtime dependencies come from the subpackage when
    /// it sets them.
    pub fn for_subpackage(ctx: &BuildContext, origin: &Package, sub: &Subpackage) -> Self {
        let description = sub.description.as_deref().unwrap_or(&origin.description);
        let depends = sub
            .dependencies
            .as_ref()
            .map(|d| d.runtime.as_slice())
            .unwrap_or(&origin.dependencies.runtime);
        Self::new(ctx, origin, &sub.name, description, depends)
    }

    fn new(
        ctx: &BuildContext,
        origin: &Package,
        name: &str,
        description: &str,
        depends: &[String],
    ) -> Self {
        let signing = match &ctx.signing_key {
            Some(path) => Signing::KeyFile {
                path: path.clone(),
                passphrase: ctx.signing_passphrase.clone(),
            },
            None => Signing::Unsigned,
        };

        Self {
            name: name.to_string(),
            version: origin.version.clone(),
            epoch: origin.epoch,
            description: description.to_string(),
            licenses: origin.licenses(),
            depends: depends.to_vec(),
            arch: ctx.arch,
            workspace_subdir: ctx.workspace_subdir(name),
            out_dir: ctx.arch_out_dir(),
            source_date_epoch: ctx.source_date_epoch,
            temp_dir: ctx.temp_dir.clone(),
            signing,
            span: info_span!("package", name = %name, arch = %ctx.arch),
        }
    }

    /// Sign with `signer` instead of a key file
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signing = Signing::Signer(signer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn licenses(&self) -> &[String] {
        &self.licenses
    }

    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Prepared tree this package is built from
    pub fn workspace_subdir(&self) -> &Path {
        &self.workspace_subdir
    }

    /// Directory intermediate member files are created in, if not the
    /// system temp dir
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// `NAME-VERSION-rEPOCH`
    pub fn identity(&self) -> String {
        format!("{}-{}-r{}", self.name, self.version, self.epoch)
    }

    /// Destination of the package file
    pub fn filename(&self) -> PathBuf {
        self.out_dir.join(format!("{}.apk", self.identity()))
    }

    /// Signature entry name, when the package will be signed
    pub fn signature_name(&self) -> Option<String> {
        match &self.signing {
            Signing::Unsigned => None,
            Signing::KeyFile { path, .. } => Some(signature_name(path)),
            Signing::Signer(signer) => Some(signer.key_name().to_string()),
        }
    }

    /// Run every stage and publish the package
    pub fn emit(&self) -> Result<EmittedPackage> {
        let _guard = self.span.enter();
        info!("generating package {}", self.identity());

        let installed_size =
            self.run_stage(Stage::Scanning, || scan_installed_size(&self.workspace_subdir))?;
        info!("  data.tar.gz installed-size: {}", installed_size);

        let mut data =
            self.run_stage(Stage::DataArchiving, || stages::write_data(self, installed_size))?;
        info!("  data.tar.gz digest: {}", data.digest);

        let mut control = self.run_stage(Stage::ControlComposing, || {
            stages::write_control(self, installed_size, &data.digest)
        })?;
        info!("  control.tar.gz digest: {}", control.digest);

        let mut signature = match self.signer() {
            None => None,
            Some(signer) => Some(self.run_stage(Stage::Signing, || {
                let signer = signer?;
                stages::write_signature(self, signer.as_ref(), &control)
            })?),
        };
        if let Some(sig) = &signature {
            info!("  signed with {}", sig.key_name);
        }

        let path = self.filename();
        let size = self.run_stage(Stage::Combining, || {
            let mut inputs: Vec<&mut dyn Read> = Vec::with_capacity(3);
            if let Some(sig) = signature.as_mut() {
                inputs.push(sig.file.as_file_mut());
            }
            inputs.push(control.file.as_file_mut());
            inputs.push(data.file.as_file_mut());
            publish(&path, &mut inputs)
        })?;
        info!("wrote {}", path.display());

        Ok(EmittedPackage {
            identity: self.identity(),
            path,
            installed_size,
            data_digest: data.digest.clone(),
            control_digest: control.digest.clone(),
            signature_name: signature.as_ref().map(|s| s.key_name.clone()),
            size,
        })
    }

    /// Signer for this job; loading a key file happens inside the signing stage
    fn signer(&self) -> Option<Result<Arc<dyn Signer>>> {
        match &self.signing {
            Signing::Unsigned => None,
            Signing::Signer(signer) => Some(Ok(Arc::clone(signer))),
            Signing::KeyFile { path, passphrase } => Some(
                RsaSigner::load(path, passphrase.as_deref()).map(|s| Arc::new(s) as Arc<dyn Signer>),
            ),
        }
    }

    fn run_stage<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        f().map_err(|source| Error::StageFailed {
            package: self.identity(),
            stage,
            source: Box::new(source),
        })
    }
}

/// Emit the origin package and every subpackage of `config`
///
/// Jobs are independent and run concurrently; a failing job does not stop
/// the others. Results are returned in build file order (origin first) and
/// the earliest failure in that order is reported.
pub fn emit_all(ctx: &BuildContext, config: &PackageConfig) -> Result<Vec<EmittedPackage>> {
    let mut jobs = vec![PackageContext::for_package(ctx, &config.package)];
    jobs.extend(
        config
            .subpackages
            .iter()
            .map(|sub| PackageContext::for_subpackage(ctx, &config.package, sub)),
    );

    let results: Vec<Result<EmittedPackage>> = jobs.par_iter().map(PackageContext::emit).collect();
    results.into_iter().collect()
}
