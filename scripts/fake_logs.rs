use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use rand::{rng, Rng};

const DEFAULT_COUNT: usize = 1_000_000;

const PODCAST_NAMES: [&str; 20] = [
    "tech-talk",
    "daily-news",
    "comedy-hour",
    "true-crime",
    "history-deep-dive",
    "startup-stories",
    "music-reviews",
    "book-club",
    "fitness-tips",
    "cooking-show",
    "travel-tales",
    "science-corner",
    "movie-reviews",
    "language-learning",
    "meditation-guide",
    "sports-weekly",
    "art-spotlight",
    "gaming-news",
    "health-matters",
    "finance-focus",
];

const USER_AGENTS: [&str; 6] = [
    "FakeAgent/1.0",
    "AppleCoreMedia/1.0.0.16G77 (iPhone; U; CPU OS 12_4 like Mac OS X; en_us)",
    "Spotify/8.8.4.669 Android/33 (SM-G781B)",
    "Overcast/3.0 (+http://overcast.fm/; iOS podcast app)",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36",
    "Pocket Casts/7.50 (Android)",
];

/// Writes synthetic access log lines: `fake_logs [count] [output]`.
fn main() -> io::Result<()> {
    let count = env::args()
        .nth(1)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_COUNT);
    let path = env::args().nth(2).unwrap_or_else(|| "fake_s3.log".to_string());

    let mut out = BufWriter::new(File::create(&path)?);
    let mut rng = rng();
    let mut partials = 0;

    for i in 0..count {
        let second = i % 60;
        let minute = (i / 60) % 60;
        let hour = (i / 3600) % 24;

        // Mostly runs of 100 lines per podcast, sometimes a random one
        let mut podcast = (i / 100) % PODCAST_NAMES.len();
        if rng.random_range(0..10) == 0 {
            podcast = rng.random_range(0..PODCAST_NAMES.len());
        }
        let name = PODCAST_NAMES[podcast];
        let episode = i / PODCAST_NAMES.len() + 1;
        let agent = USER_AGENTS[rng.random_range(0..USER_AGENTS.len())];

        let partial = i % 7 == 0;
        let object_size: u64 = 15_000_000 + rng.random_range(0..10_000_000);
        let bytes_sent = if partial {
            rng.random_range(0..object_size)
        } else {
            object_size
        };

        write!(
            out,
            "79a59df900b949e5 bucket{} [03/May/2025:{:02}:{:02}:{:02} +0000] 203.0.113.{} \
             arn:aws:iam::123456789012:user/test-{} EXAMPLEID{} REST.GET.OBJECT \
             {name}/episode-{episode}.mp3 \"GET /{name}/episode-{episode}.mp3 HTTP/1.1\" {} - \
             {bytes_sent} {object_size} {} 42 \"-\" \"{agent}\" v{} HOSTID{} SigV2 \
             ECDHE-RSA-AES128-GCM-SHA256 AuthHeader host{}.example.com TLSv1.2 \
             arn:aws:s3:::example-AP{} false",
            i % 1000,
            hour,
            minute,
            second,
            i % 255,
            i % 100,
            i,
            if partial { 206 } else { 200 },
            20 + rng.random_range(0..100),
            i % 500,
            i % 50,
            i % 10,
            i % 100,
        )?;

        if partial {
            let start = rng.random_range(0..object_size / 2);
            let end = (start + bytes_sent).saturating_sub(1);
            write!(out, " \"bytes={start}-{end}\"")?;
            partials += 1;
        }
        writeln!(out)?;
    }
    out.flush()?;

    println!(
        "Generated {count} log entries across {} podcasts with {partials} partial downloads (206 responses) in {path}",
        PODCAST_NAMES.len()
    );
    Ok(())
}
