//! Easing, fades, and clip transitions.

/// Cubic ease-out: fast start, gentle landing.
pub fn ease_out_cubic(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    1.0 - (1.0 - x).powi(3)
}

/// Starting scale of a caption's landing effect, in percent.
const LANDING_FROM: f64 = 75.0;

/// Keyframes used to approximate the landing curve.
const LANDING_STEPS: u32 = 5;

/// ASS override tags for the landing effect: the caption starts at 75% and
/// grows to 100% over `landing` seconds along an ease-out-cubic curve.
pub fn landing_tags(landing: f64) -> String {
    let total_ms = (landing * 1000.0).round().max(0.0) as u32;
    if total_ms == 0 {
        return String::new();
    }
    let mut tags = format!("\\fscx{0}\\fscy{0}", LANDING_FROM as u32);
    let mut previous = 0;
    for step in 1..=LANDING_STEPS {
        let t = total_ms * step / LANDING_STEPS;
        let scale = LANDING_FROM + (100.0 - LANDING_FROM) * ease_out_cubic(step as f64 / LANDING_STEPS as f64);
        tags.push_str(&format!(
            "\\t({},{},\\fscx{:.0}\\fscy{:.0})",
            previous, t, scale, scale
        ));
        previous = t;
    }
    tags
}

/// Fade from and to black at the ends of a `duration`-long video.
///
/// Returns `None` when the transition is zero or would not fit twice.
pub fn video_fades(duration: f64, transition: f64) -> Option<String> {
    if transition <= 0.0 || duration <= transition * 2.0 {
        return None;
    }
    Some(format!(
        "fade=t=in:st=0:d={t:.3},fade=t=out:st={out:.3}:d={t:.3}",
        t = transition,
        out = duration - transition
    ))
}

/// Audio fade-in at the start and fade-out at the end of `duration`.
/// Fades that would not fit are dropped.
pub fn audio_fades(duration: f64, fade_in: f64, fade_out: f64) -> Option<String> {
    let mut parts = Vec::new();
    if fade_in > 0.0 && fade_in < duration {
        parts.push(format!("afade=t=in:st=0:d={:.3}", fade_in));
    }
    if fade_out > 0.0 && fade_out < duration {
        parts.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            duration - fade_out,
            fade_out
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// How `count` clips share a `duration` when neighbours overlap by a
/// crossfade.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSlots {
    /// Length each clip is trimmed to
    pub segment: f64,
    /// Crossfade length actually used
    pub transition: f64,
    /// Start of each crossfade on the output timeline (one fewer than clips)
    pub offsets: Vec<f64>,
}

/// Lay out `count` clips over `duration` with crossfades of `transition`.
///
/// Every clip gets `(duration + (count - 1) * transition) / count` seconds so
/// the overlapped result is exactly `duration` long. The crossfade is
/// shortened to half a segment when clips would be too short for it.
pub fn clip_slots(count: usize, duration: f64, transition: f64) -> ClipSlots {
    if count <= 1 {
        return ClipSlots {
            segment: duration,
            transition: 0.0,
            offsets: Vec::new(),
        };
    }
    let n = count as f64;
    let mut transition = transition.max(0.0);
    let mut segment = (duration + (n - 1.0) * transition) / n;
    if transition > segment / 2.0 {
        // t = s/2 and s = (d + (n-1)t)/n  =>  s = 2d / (n + 1)
        segment = 2.0 * duration / (n + 1.0);
        transition = segment / 2.0;
    }
    let offsets = (1..count)
        .map(|k| k as f64 * (segment - transition))
        .collect();
    ClipSlots {
        segment,
        transition,
        offsets,
    }
}

/// Chain `labels` into one stream named `out` with crossfades.
/// With no transition the clips are concatenated.
pub fn xfade_chain(labels: &[String], slots: &ClipSlots, out: &str) -> String {
    match labels.len() {
        0 => String::new(),
        1 => format!("[{}]null[{}]", labels[0], out),
        n if slots.transition <= 0.0 => {
            let inputs: String = labels.iter().map(|l| format!("[{}]", l)).collect();
            format!("{}concat=n={}:v=1:a=0[{}]", inputs, n, out)
        }
        n => {
            let mut parts = Vec::with_capacity(n - 1);
            let mut previous = labels[0].clone();
            for (i, (label, offset)) in labels[1..].iter().zip(&slots.offsets).enumerate() {
                let target = if i + 2 == n {
                    out.to_string()
                } else {
                    format!("xf{}", i + 1)
                };
                parts.push(format!(
                    "[{}][{}]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
                    previous, label, slots.transition, offset, target
                ));
                previous = target;
            }
            parts.join(";")
        }
    }
}
