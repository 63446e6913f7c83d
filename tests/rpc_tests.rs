use stacktrace_translator::rpc::{router, AppState, RpcClient};
use stacktrace_translator::symbols::{AddressResolver, ArchiveTool};
use stacktrace_translator::utils::config::Config;
use stacktrace_translator::utils::error::{RpcError, ToolError};
use stacktrace_translator::StacktraceTranslator;
use std::fs::File;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

struct OneModuleArchive;

impl ArchiveTool for OneModuleArchive {
    fn list(&self, _: &Path) -> Result<Vec<String>, ToolError> {
        Ok(vec!["spring.dbg".to_string()])
    }

    fn extract(&self, _: &Path, entry: &str, mut dest: File) -> Result<(), ToolError> {
        dest.write_all(entry.as_bytes()).map_err(|source| ToolError::Io {
            tool: "7za".to_string(),
            source,
        })
    }
}

struct FixedResolver;

impl AddressResolver for FixedResolver {
    fn resolve(&self, _: &Path, addresses: &[String], _: bool) -> Result<Vec<String>, ToolError> {
        Ok(addresses
            .iter()
            .map(|_| "/home/buildbot/build/rts/Game/Game.cpp:1020".to_string())
            .collect())
    }
}

/// Start the service on an ephemeral port in a background runtime
fn start_server(root: &Path) -> SocketAddr {
    let mut config = Config::default();
    config.symbols.root = root.to_path_buf();
    let translator =
        StacktraceTranslator::with_tools(config, Arc::new(OneModuleArchive), Arc::new(FixedResolver)).unwrap();
    let app = router(AppState::new(Arc::new(translator), 2));

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

#[test]
fn test_remote_translation_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("default/master/0.82.5/win32");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("spring_0.82.5_dbg.7z"), "").unwrap();

    let addr = start_server(root.path());
    let client = RpcClient::new(format!("http://{addr}/")).unwrap();

    let result = client
        .translate_stacktrace(
            "Spring 0.82.5 (0.82.5) has crashed.\n\
             (0) C:\\Spring\\spring.exe [0x0080F268]\n\
             (1) C:\\Windows\\kernel32.dll [0x7C817077]\n",
        )
        .unwrap();

    assert_eq!(result.revision, "0.82.5");
    assert_eq!(result.stacktrace.len(), 2);
    assert_eq!(result.stacktrace[0].file, "rts/Game/Game.cpp");
    assert_eq!(result.stacktrace[0].line, 1020);
    assert_eq!(result.stacktrace[1].index, 1);
    assert_eq!(result.stacktrace[1].file, "??");

    let err = client.translate_stacktrace("no frames").unwrap_err();
    assert!(matches!(err, RpcError::Fatal(reason) if reason == "No stack frames found in infolog"));
}
