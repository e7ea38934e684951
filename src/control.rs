// src/control.rs

//! `.PKGINFO` control record
//!
//! The control record is a line-oriented `key = value` document. Field order
//! is fixed because apk-tools and index generators read it positionally:
//!
//! ```text
//! # Generated by apkpack.
//! pkgname = hello
//! pkgver = 2.12-r0
//! arch = x86_64
//! size = 53248
//! pkgdesc = the GNU hello world program
//! license = GPL-3.0-or-later
//! depend = busybox
//! datahash = 5a1f...
//! ```

use crate::error::{Error, Result};

/// Archive entry name of the control record
pub const PKGINFO_NAME: &str = ".PKGINFO";

/// Fields rendered into `.PKGINFO`
///
/// Every scalar field must be set before rendering; [`ControlRecord::render`]
/// reports the first unset field instead of emitting a truncated record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlRecord {
    pub pkgname: Option<String>,
    pub version: Option<String>,
    pub epoch: Option<u64>,
    pub arch: Option<String>,
    pub size: Option<u64>,
    pub description: Option<String>,
    pub licenses: Vec<String>,
    pub depends: Vec<String>,
    pub datahash: Option<String>,
}

impl ControlRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.pkgname = Some(name.to_string());
        self
    }

    pub fn with_version(mut self, version: &str, epoch: u64) -> Self {
        self.version = Some(version.to_string());
        self.epoch = Some(epoch);
        self
    }

    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = Some(arch.to_string());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Add license lines, skipping values already present
    pub fn with_licenses<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for license in licenses {
            let license = license.into();
            if !self.licenses.contains(&license) {
                self.licenses.push(license);
            }
        }
        self
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends.extend(depends.into_iter().map(Into::into));
        self
    }

    pub fn with_datahash(mut self, datahash: &str) -> Self {
        self.datahash = Some(datahash.to_string());
        self
    }

    /// Render the record text
    pub fn render(&self) -> Result<String> {
        let pkgname = required("pkgname", self.pkgname.as_deref())?;
        let version = required("pkgver", self.version.as_deref())?;
        let epoch = self.epoch.ok_or(Error::MissingField("pkgver"))?;
        let arch = required("arch", self.arch.as_deref())?;
        let size = self.size.ok_or(Error::MissingField("size"))?;
        let description = required("pkgdesc", self.description.as_deref())?;
        let datahash = required("datahash", self.datahash.as_deref())?;

        let mut out = String::new();
        out.push_str("\n# Generated by apkpack.\n");
        push_line(&mut out, "pkgname", pkgname)?;
        push_line(&mut out, "pkgver", &format!("{}-r{}", version, epoch))?;
        push_line(&mut out, "arch", arch)?;
        push_line(&mut out, "size", &size.to_string())?;
        push_line(&mut out, "pkgdesc", description)?;
        for license in &self.licenses {
            push_line(&mut out, "license", license)?;
        }
        for depend in &self.depends {
            push_line(&mut out, "depend", depend)?;
        }
        push_line(&mut out, "datahash", datahash)?;

        Ok(out)
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or(Error::MissingField(field))
}

fn push_line(out: &mut String, key: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(Error::ParseError(format!(
            "control field {} contains a line break",
            key
        )));
    }
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(value);
    out.push('\n');
    Ok(())
}

/// A control record read back from a package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgInfo {
    pub pkgname: String,
    /// `version-rN`
    pub pkgver: String,
    pub arch: String,
    pub size: u64,
    pub pkgdesc: String,
    pub licenses: Vec<String>,
    pub depends: Vec<String>,
    pub datahash: String,
}

impl PkgInfo {
    /// Parse `.PKGINFO` text
    ///
    /// Blank lines and `#` comments are ignored; unknown keys are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut info = PkgInfo::default();
        let mut size = None;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::InvalidPackage(format!(".PKGINFO line {} is not key = value", lineno + 1))
            })?;
            let value = value.trim().to_string();

            match key.trim() {
                "pkgname" => info.pkgname = value,
                "pkgver" => info.pkgver = value,
                "arch" => info.arch = value,
                "size" => {
                    size = Some(value.parse::<u64>().map_err(|_| {
                        Error::InvalidPackage(format!("invalid size in .PKGINFO: {}", value))
                    })?)
                }
                "pkgdesc" => info.pkgdesc = value,
                "license" => info.licenses.push(value),
                "depend" => info.depends.push(value),
                "datahash" => info.datahash = value,
                _ => {}
            }
        }

        if info.pkgname.is_empty() {
            return Err(Error::InvalidPackage(".PKGINFO has no pkgname".to_string()));
        }
        if info.datahash.is_empty() {
            return Err(Error::InvalidPackage(".PKGINFO has no datahash".to_string()));
        }
        info.size = size.ok_or_else(|| Error::InvalidPackage(".PKGINFO has no size".to_string()))?;

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATAHASH: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    fn complete_record() -> ControlRecord {
        ControlRecord::new()
            .with_name("hello")
            .with_version("2.12", 1)
            .with_arch("x86_64")
            .with_size(53248)
            .with_description("the GNU hello world program")
            .with_licenses(["GPL-3.0-or-later", "MIT", "GPL-3.0-or-later"])
            .with_depends(["busybox", "so:libc.musl-x86_64.so.1"])
            .with_datahash(DATAHASH)
    }

    #[test]
    fn test_render_exact_layout() {
        let text = complete_record().render().unwrap();

        let expected = format!(
            "\n# Generated by apkpack.\n\
             pkgname = hello\n\
             pkgver = 2.12-r1\n\
             arch = x86_64\n\
             size = 53248\n\
             pkgdesc = the GNU hello world program\n\
             license = GPL-3.0-or-later\n\
             license = MIT\n\
             depend = busybox\n\
             depend = so:libc.musl-x86_64.so.1\n\
             datahash = {}\n",
            DATAHASH
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_without_licenses_or_depends() {
        let record = ControlRecord::new()
            .with_name("pkgA")
            .with_version("1.0", 0)
            .with_arch("aarch64")
            .with_size(10)
            .with_description("")
            .with_datahash(DATAHASH);
        let text = record.render().unwrap();

        assert!(text.contains("pkgdesc = \ndatahash = "));
        assert!(!text.contains("license"));
        assert!(!text.contains("depend"));
    }

    #[test]
    fn test_unset_fields_fail_loudly() {
        let mut record = complete_record();
        record.datahash = None;
        assert!(matches!(record.render(), Err(Error::MissingField("datahash"))));

        let mut record = complete_record();
        record.epoch = None;
        assert!(matches!(record.render(), Err(Error::MissingField("pkgver"))));

        let mut record = complete_record();
        record.size = None;
        assert!(matches!(record.render(), Err(Error::MissingField("size"))));

        assert!(matches!(ControlRecord::new().render(), Err(Error::MissingField("pkgname"))));
    }

    #[test]
    fn test_line_break_in_value_rejected() {
        let record = complete_record().with_description("one\nfake = line");
        assert!(matches!(record.render(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_rendered_record() {
        let info = PkgInfo::parse(&complete_record().render().unwrap()).unwrap();

        assert_eq!(info.pkgname, "hello");
        assert_eq!(info.pkgver, "2.12-r1");
        assert_eq!(info.arch, "x86_64");
        assert_eq!(info.size, 53248);
        assert_eq!(info.licenses, vec!["GPL-3.0-or-later", "MIT"]);
        assert_eq!(info.depends, vec!["busybox", "so:libc.musl-x86_64.so.1"]);
        assert_eq!(info.datahash, DATAHASH);
    }

    #[test]
    fn test_parse_rejects_incomplete_record() {
        assert!(PkgInfo::parse("pkgname = a\nsize = 1\n").is_err());
        assert!(PkgInfo::parse("pkgname = a\nsize = big\ndatahash = x\n").is_err());
        assert!(PkgInfo::parse("garbage\n").is_err());
    }
}
