//! OpenPGP encryption seam.
//!
//! Encryption is delegated: the client never implements OpenPGP itself. The
//! [`Encryptor`] trait is the seam, and [`GpgEncryptor`] drives the system
//! `gpg` binary. Passphrases come from `gpg-agent` unless one is configured
//! with [`GpgEncryptor::with_passphrase`].
//!
//! Users are addressed by the OpenPGP user id `{user_id}@{instance_name}`.
//! Generated keys are an RSA-3072 signing primary with an RSA-3072
//! encryption subkey, valid for five years or forever.

use std::{
    fmt,
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
};

use uuid::Uuid;

use crate::{client::ServerInfo, error::ClientError};

/// Validity of generated keys that expire.
const KEY_VALIDITY: &str = "5y";

/// Encrypts message frames for board members and decrypts received ones.
pub trait Encryptor: Send + Sync {
    /// Encrypt `data` to every recipient and sign it as `sender`.
    fn encrypt(&self, data: &[u8], recipients: &[Uuid], sender: Uuid) -> Result<Vec<u8>, ClientError>;

    /// Decrypt and verify `data`.
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ClientError>;

    /// Create a key pair for a user and return the public key in binary
    /// OpenPGP form, ready for [`User::add_key`](crate::User::add_key).
    fn generate_key(
        &self,
        user_name: &str,
        user_id: Uuid,
        never_expire: bool,
    ) -> Result<Vec<u8>, ClientError>;
}

/// [`Encryptor`] backed by a `gpg` subprocess.
#[derive(Clone, PartialEq, Eq)]
pub struct GpgEncryptor {
    program: PathBuf,
    instance_name: String,
    passphrase: Option<String>,
}

impl GpgEncryptor {
    /// Use `gpg` from `PATH` for users of `instance_name`.
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self { program: PathBuf::from("gpg"), instance_name: instance_name.into(), passphrase: None }
    }

    /// Use `gpg` from `PATH` for users of the instance described by `info`.
    pub fn for_instance(info: &ServerInfo) -> Self {
        Self::new(info.instance_name.clone())
    }

    /// Unlock and protect keys with `passphrase` instead of asking
    /// `gpg-agent`.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Use a specific gpg binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// OpenPGP user id for a Subtext user.
    pub fn uid(&self, user_id: Uuid) -> String {
        format!("{user_id}@{}", self.instance_name)
    }

    /// Loopback pinentry arguments. `protect` forces an explicit (possibly
    /// empty) passphrase so key generation never prompts.
    fn passphrase_args(&self, protect: bool) -> Vec<String> {
        let passphrase = match (&self.passphrase, protect) {
            (Some(p), _) => p.clone(),
            (None, true) => String::new(),
            (None, false) => return Vec::new(),
        };
        vec![
            "--pinentry-mode".to_string(),
            "loopback".to_string(),
            "--passphrase".to_string(),
            passphrase,
        ]
    }

    fn encrypt_args(&self, recipients: &[Uuid], sender: Uuid) -> Vec<String> {
        let mut args: Vec<String> = ["--batch", "--yes", "--trust-model", "always"]
            .iter()
            .map(ToString::to_string)
            .collect();
        args.extend(self.passphrase_args(false));
        args.extend(["--encrypt", "--sign", "--local-user"].map(ToString::to_string));
        args.push(self.uid(sender));
        for recipient in recipients {
            args.push("--recipient".to_string());
            args.push(self.uid(*recipient));
        }
        args.extend(["--output".to_string(), "-".to_string()]);
        args
    }

    fn decrypt_args(&self) -> Vec<String> {
        let mut args: Vec<String> =
            ["--batch", "--trust-model", "always"].iter().map(ToString::to_string).collect();
        args.extend(self.passphrase_args(false));
        args.extend(["--decrypt", "--output", "-"].map(ToString::to_string));
        args
    }

    /// Full OpenPGP user id of a generated key: `{name} <{id}@{instance}>`.
    fn key_uid(&self, user_name: &str, user_id: Uuid) -> String {
        format!("{user_name} <{}>", self.uid(user_id))
    }

    fn generate_args(&self, user_name: &str, user_id: Uuid, never_expire: bool) -> Vec<String> {
        let expire = if never_expire { "never" } else { KEY_VALIDITY };
        let mut args: Vec<String> =
            ["--batch", "--status-fd", "1"].iter().map(ToString::to_string).collect();
        args.extend(self.passphrase_args(true));
        args.push("--quick-gen-key".to_string());
        args.push(self.key_uid(user_name, user_id));
        args.extend(["rsa3072", "sign", expire].map(ToString::to_string));
        args
    }

    fn add_subkey_args(&self, fingerprint: &str, never_expire: bool) -> Vec<String> {
        let expire = if never_expire { "never" } else { KEY_VALIDITY };
        let mut args = vec!["--batch".to_string()];
        args.extend(self.passphrase_args(true));
        args.push("--quick-add-key".to_string());
        args.push(fingerprint.to_string());
        args.extend(["rsa3072", "encr", expire].map(ToString::to_string));
        args
    }

    /// Pipe `input` through gpg and return stdout.
    fn run(&self, args: &[String], input: &[u8]) -> Result<Vec<u8>, ClientError> {
        let failed = |reason: String| ClientError::Encryption { reason };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("cannot start {}: {e}", self.program.display())))?;

        let mut stdin = child.stdin.take().ok_or_else(|| failed("stdin unavailable".to_string()))?;
        let input = input.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().map_err(|e| failed(e.to_string()))?;
        writer
            .join()
            .map_err(|_| failed("stdin writer panicked".to_string()))?
            .map_err(|e| failed(format!("writing to gpg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, "gpg failed");
            return Err(failed(format!("gpg exited with {}: {}", output.status, stderr.trim())));
        }

        Ok(output.stdout)
    }
}

/// Fingerprint from the `KEY_CREATED` status line of `--status-fd` output.
fn created_fingerprint(status: &[u8]) -> Option<String> {
    String::from_utf8_lossy(status).lines().find_map(|line| {
        let mut fields = line.strip_prefix("[GNUPG:] KEY_CREATED ")?.split_whitespace();
        let _kind = fields.next()?;
        fields.next().map(ToString::to_string)
    })
}

impl Encryptor for GpgEncryptor {
    fn encrypt(&self, data: &[u8], recipients: &[Uuid], sender: Uuid) -> Result<Vec<u8>, ClientError> {
        self.run(&self.encrypt_args(recipients, sender), data)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.run(&self.decrypt_args(), data)
    }

    fn generate_key(
        &self,
        user_name: &str,
        user_id: Uuid,
        never_expire: bool,
    ) -> Result<Vec<u8>, ClientError> {
        let status = self.run(&self.generate_args(user_name, user_id, never_expire), &[])?;
        let fingerprint = created_fingerprint(&status).ok_or_else(|| ClientError::Encryption {
            reason: "gpg did not report the created key".to_string(),
        })?;
        self.run(&self.add_subkey_args(&fingerprint, never_expire), &[])?;

        let export = ["--batch".to_string(), "--export".to_string(), fingerprint.clone()];
        let key = self.run(&export, &[])?;
        tracing::info!(%user_id, %fingerprint, "generated key");
        Ok(key)
    }
}

impl fmt::Debug for GpgEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpgEncryptor")
            .field("program", &self.program)
            .field("instance_name", &self.instance_name)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_format() {
        let gpg = GpgEncryptor::new("chat.example.org");
        assert_eq!(
            gpg.uid(Uuid::from_u128(1)),
            "00000000-0000-0000-0000-000000000001@chat.example.org"
        );
    }

    #[test]
    fn encrypt_args_list_every_recipient() {
        let gpg = GpgEncryptor::new("x");
        let args = gpg.encrypt_args(&[Uuid::from_u128(2), Uuid::from_u128(3)], Uuid::from_u128(1));

        assert_eq!(args.iter().filter(|a| *a == "--recipient").count(), 2);
        let sender = args.iter().position(|a| a == "--local-user").expect("sender flag");
        assert_eq!(args[sender + 1], gpg.uid(Uuid::from_u128(1)));
        assert!(!args.contains(&"--armor".to_string()));
    }

    #[test]
    fn passphrase_switches_to_loopback() {
        let plain = GpgEncryptor::new("x");
        assert!(!plain.decrypt_args().contains(&"--pinentry-mode".to_string()));

        let locked = GpgEncryptor::new("x").with_passphrase("hunter2");
        let args = locked.decrypt_args();
        let flag = args.iter().position(|a| a == "--passphrase").expect("passphrase flag");
        assert_eq!(args[flag + 1], "hunter2");
        assert!(!format!("{locked:?}").contains("hunter2"));
    }

    #[test]
    fn generate_args_describe_sign_key_with_uid() {
        let gpg = GpgEncryptor::new("chat.example.org");
        let id = Uuid::from_u128(1);

        let args = gpg.generate_args("alice", id, false);
        let at = args.iter().position(|a| a == "--quick-gen-key").expect("gen flag");
        assert_eq!(
            &args[at + 1..],
            &[
                "alice <00000000-0000-0000-0000-000000000001@chat.example.org>".to_string(),
                "rsa3072".to_string(),
                "sign".to_string(),
                "5y".to_string(),
            ]
        );
        // Unprotected key unless a passphrase is configured.
        let flag = args.iter().position(|a| a == "--passphrase").expect("passphrase flag");
        assert_eq!(args[flag + 1], "");

        let subkey = gpg.add_subkey_args("ABCD", true);
        assert_eq!(&subkey[subkey.len() - 4..], &["ABCD", "rsa3072", "encr", "never"]);
    }

    #[test]
    fn created_fingerprint_from_status() {
        let status = b"[GNUPG:] KEY_CONSIDERED 0011 0\n[GNUPG:] KEY_CREATED P 0123456789ABCDEF\n";
        assert_eq!(created_fingerprint(status).as_deref(), Some("0123456789ABCDEF"));
        assert_eq!(created_fingerprint(b"[GNUPG:] PROGRESS\n"), None);
    }

    #[test]
    fn instance_name_from_server_info() {
        let info = ServerInfo {
            instance_name: "chat.example.org".to_string(),
            instance_id: Uuid::nil(),
            extra: serde_json::Map::new(),
        };
        let gpg = GpgEncryptor::for_instance(&info);
        assert_eq!(gpg, GpgEncryptor::new("chat.example.org"));
    }

    #[test]
    fn missing_binary_is_encryption_error() {
        let gpg = GpgEncryptor::new("x").with_program("/nonexistent/gpg");
        let result = gpg.decrypt(b"data");
        assert!(matches!(result, Err(ClientError::Encryption { .. })));
        let generated = gpg.generate_key("alice", Uuid::nil(), true);
        assert!(matches!(generated, Err(ClientError::Encryption { .. })));
    }
}
