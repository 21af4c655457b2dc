//! 증분 읽기 -- 마지막 오프셋 이후에 추가된 내용만 읽습니다.
//!
//! # 동작
//! 1. 파일을 열고 현재 크기를 확인합니다.
//! 2. 저장된 오프셋이 크기보다 크면 truncation/rotation으로 보고 0부터 읽습니다.
//! 3. 새 내용이 없으면 빈 텍스트와 같은 오프셋을 반환합니다.
//! 4. `[offset, size)` 구간을 라인 단위로 흘려 읽으며 최근 `max_lines` 라인만 유지합니다.
//!
//! 메모리 사용량은 구간 크기가 아니라 `max_lines`개 라인 크기로 제한됩니다.
//! 크기를 확인한 뒤에 추가된 바이트는 다음 패스에서 읽습니다.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info};

use crate::error::MonitorError;

/// 증분 읽기 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// 분석에 넘길 텍스트 (라인 종결자 포함, 최대 `max_lines` 라인)
    pub text: String,
    /// 다음 패스에서 사용할 오프셋 (읽기 시점의 파일 크기)
    pub new_offset: u64,
    /// 파일이 저장된 오프셋보다 작아져 처음부터 읽었는지 여부
    pub truncated: bool,
    /// 새로 읽은 전체 라인 수
    pub lines_total: usize,
    /// 라인 상한으로 버려진 라인 수
    pub lines_dropped: usize,
}

impl Extraction {
    /// 새 내용이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// 파일에서 `last_offset` 이후의 새 내용을 읽습니다.
///
/// 파일을 열거나 읽을 수 없으면 [`MonitorError::Read`]를 반환하며,
/// 이때 호출자는 오프셋을 바꾸지 않아야 합니다.
pub async fn extract(
    path: &Path,
    last_offset: u64,
    max_lines: usize,
) -> Result<Extraction, MonitorError> {
    let read_err = |source: std::io::Error| MonitorError::Read {
        path: path.display().to_string(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(read_err)?;
    let size = file.metadata().await.map_err(read_err)?.len();

    let truncated = last_offset > size;
    let start = if truncated {
        info!(
            path = %path.display(),
            previous_offset = last_offset,
            size,
            "log file shrank below recorded offset, reading from start"
        );
        0
    } else {
        last_offset
    };

    if size == start {
        debug!(path = %path.display(), offset = start, "no new content");
        return Ok(Extraction {
            new_offset: start,
            truncated,
            ..Default::default()
        });
    }

    file.seek(SeekFrom::Start(start)).await.map_err(read_err)?;

    let mut reader = BufReader::new(file.take(size - start));
    let mut window = LineWindow::new(max_lines);
    let mut line = Vec::new();
    let mut consumed = 0u64;
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await.map_err(read_err)?;
        if n == 0 {
            break;
        }
        consumed += n as u64;
        window.push(&line);
    }

    // take()는 파일이 그 사이 줄어들면 더 적게 읽을 수 있음
    let new_offset = start + consumed;
    let lines_total = window.total();
    let lines_dropped = window.dropped();
    let text = window.into_text();

    debug!(
        path = %path.display(),
        from = start,
        to = new_offset,
        lines = lines_total,
        dropped = lines_dropped,
        "extracted new content"
    );

    Ok(Extraction {
        text,
        new_offset,
        truncated,
        lines_total,
        lines_dropped,
    })
}

/// 최근 `capacity`개 라인만 유지하는 슬라이딩 창
///
/// 라인 종결자는 유지하며, 창에서 밀려난 라인의 버퍼는 재사용합니다.
#[derive(Debug, Clone, Default)]
pub struct LineWindow {
    capacity: usize,
    lines: VecDeque<Vec<u8>>,
    total: usize,
}

impl LineWindow {
    /// 최대 `capacity`개 라인을 유지하는 창을 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(1024)),
            total: 0,
        }
    }

    /// 라인 하나를 추가합니다. 창이 가득 차 있으면 가장 오래된 라인을 버립니다.
    pub fn push(&mut self, line: &[u8]) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        let buf = if self.lines.len() == self.capacity {
            self.lines.pop_front().map(|mut old| {
                old.clear();
                old.extend_from_slice(line);
                old
            })
        } else {
            None
        };
        self.lines.push_back(buf.unwrap_or_else(|| line.to_vec()));
    }

    /// 지금까지 추가된 전체 라인 수
    pub fn total(&self) -> usize {
        self.total
    }

    /// 창에 남아 있는 라인 수
    pub fn retained(&self) -> usize {
        self.lines.len()
    }

    /// 창에서 밀려난 라인 수
    pub fn dropped(&self) -> usize {
        self.total - self.lines.len()
    }

    /// 남은 라인을 이어 붙여 UTF-8로 디코딩합니다 (잘못된 바이트는 U+FFFD).
    pub fn into_text(self) -> String {
        let bytes: Vec<u8> = self.lines.into_iter().flatten().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
